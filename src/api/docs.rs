//! OpenAPI document and the browsable API reference page.

use crate::entity::{EntitySchema, CATEGORY_SCHEMA};
use serde_json::{json, Map, Value};

pub const OPENAPI_PATH: &str = "/openapi.json";
pub const REFERENCE_PATH: &str = "/scalar";

fn query_parameter(name: &str, description: &str, schema: Value) -> Value {
    json!({
        "name": name,
        "in": "query",
        "required": false,
        "description": description,
        "schema": schema,
    })
}

fn entity_component(schema: &EntitySchema) -> Value {
    let mut properties = Map::new();
    for property in schema.properties {
        let field = match property.edm_type {
            crate::entity::EdmType::Int32 => json!({ "type": "integer", "format": "int32" }),
            crate::entity::EdmType::String => json!({ "type": "string" }),
        };
        properties.insert(property.name.to_string(), field);
    }
    let required: Vec<&str> = schema
        .properties
        .iter()
        .filter(|p| !p.nullable)
        .map(|p| p.name)
        .collect();
    json!({ "type": "object", "required": required, "properties": properties })
}

/// OpenAPI 3.0 description of the public routes.
pub fn openapi_document() -> Value {
    let error_body = json!({ "$ref": "#/components/schemas/ODataError" });
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Category OData API",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "tags": [
            { "name": "Categories", "description": "Query the category collection" },
            { "name": "SeedCategories", "description": "Insert fake categories" }
        ],
        "paths": {
            "/odata/Categories": {
                "get": {
                    "tags": ["Categories"],
                    "operationId": "GetCategories",
                    "parameters": [
                        query_parameter("$filter", "Filter expression, e.g. contains(name,'a')", json!({ "type": "string" })),
                        query_parameter("$orderby", "Comma-separated properties with optional asc/desc", json!({ "type": "string" })),
                        query_parameter("$expand", "Navigation properties to include", json!({ "type": "string" })),
                        query_parameter("$count", "Include @odata.count", json!({ "type": "boolean" })),
                        query_parameter("$top", "Maximum rows to return", json!({ "type": "integer", "minimum": 0 })),
                        query_parameter("$skip", "Rows to skip", json!({ "type": "integer", "minimum": 0 })),
                    ],
                    "responses": {
                        "200": {
                            "description": "Matching categories",
                            "content": { "application/json": { "schema": {
                                "type": "object",
                                "properties": {
                                    "@odata.context": { "type": "string" },
                                    "@odata.count": { "type": "integer" },
                                    "value": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Category" }
                                    }
                                }
                            }}}
                        },
                        "400": {
                            "description": "Invalid or disallowed query option",
                            "content": { "application/json": { "schema": error_body.clone() } }
                        },
                        "500": {
                            "description": "Storage failure",
                            "content": { "application/json": { "schema": error_body.clone() } }
                        }
                    }
                }
            },
            "/odata/Categories/$count": {
                "get": {
                    "tags": ["Categories"],
                    "operationId": "CountCategories",
                    "parameters": [
                        query_parameter("$filter", "Filter expression, e.g. contains(name,'a')", json!({ "type": "string" })),
                    ],
                    "responses": {
                        "200": {
                            "description": "Number of matching categories",
                            "content": { "text/plain": { "schema": { "type": "integer", "minimum": 0 } } }
                        },
                        "400": {
                            "description": "Invalid or disallowed query option",
                            "content": { "application/json": { "schema": error_body.clone() } }
                        },
                        "500": {
                            "description": "Storage failure",
                            "content": { "application/json": { "schema": error_body.clone() } }
                        }
                    }
                }
            },
            "/seed-data/categories": {
                "get": {
                    "tags": ["SeedCategories"],
                    "operationId": "SeedCategories",
                    "responses": {
                        "204": { "description": "Categories inserted" },
                        "500": {
                            "description": "Storage failure",
                            "content": { "application/json": { "schema": error_body } }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Category": entity_component(&CATEGORY_SCHEMA),
                "ODataError": {
                    "type": "object",
                    "properties": {
                        "error": {
                            "type": "object",
                            "properties": {
                                "code": { "type": "string" },
                                "message": { "type": "string" },
                                "target": { "type": "string" }
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Scalar API reference page rendering [`OPENAPI_PATH`].
pub fn reference_page() -> String {
    format!(
        r#"<!doctype html>
<html>
  <head>
    <title>Category OData API</title>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
  </head>
  <body>
    <script id="api-reference" data-url="{OPENAPI_PATH}"></script>
    <script src="https://cdn.jsdelivr.net/npm/@scalar/api-reference"></script>
  </body>
</html>
"#
    )
}
