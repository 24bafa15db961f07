//! Contract flow demonstration.
//!
//! This example shows a route contract doing its job end to end:
//! 1. Load the engine configuration and a route from TOML
//! 2. Register handlers explicitly and bind them to the routes
//! 3. Serve valid and invalid requests through the gate
//! 4. Print what the client would receive
//!
//! Run with: `cargo run --example contract_flow`

use contract_core::web::{MemoryResponse, MemoryTransport, RouteTable, Transport};
use contract_core::{ContractEngine, EngineConfig, HandlerError, HandlerRegistry, HttpMethod};
use serde_json::json;

const CONFIG: &str = r#"
controller_namespace = "Shop"

[[routes]]
path = "/items/{id}"
method = "GET"
protocols = ["HTTPS"]
response_content_types = ["application/json", "application/xml"]
status_codes = [200, 404]

[[routes.parameters]]
name = "id"
in = "path"
type = "integer"
required = true
minimum = 1

[[routes]]
path = "/items"
method = "POST"
protocols = ["HTTPS"]
request_content_types = ["application/json"]
response_content_types = ["application/json"]
status_codes = [201, 400]

[routes.schemas."application/json"]
type = "object"
required = ["name", "price"]
properties = { name = { type = "string", minLength = 1 }, price = { type = "number", minimum = 0 } }
"#;

fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register("/items/{id}", HttpMethod::Get, |transport, response| {
            match transport.parameter("id").and_then(|id| id.as_i64()) {
                Some(42) => {
                    response.set_content(json!({"id": 42, "name": "Desk lamp", "price": 39.5}));
                    Ok(())
                }
                _ => Err(HandlerError::new(404, "Item not found")),
            }
        })
        .register("/items", HttpMethod::Post, |transport, response| {
            let mut item = transport.payload_body().cloned().unwrap_or_default();
            item["id"] = json!(43);
            response.set_location("/items/43");
            response.set_content(item);
            Ok(())
        });
    registry
}

fn print_response(label: &str, response: &MemoryResponse) {
    println!("--- {label}");
    println!("status: {}", response.status);
    for (name, value) in &response.headers {
        println!("{name}: {value}");
    }
    println!("{}\n", response.text());
}

fn get(host: &RouteTable, path: &str, protocol: &str, accept: &str) -> MemoryResponse {
    let Some((route, params)) = host.find(HttpMethod::Get, path) else {
        panic!("no route for {path}");
    };
    let mut builder = MemoryTransport::builder().protocol(protocol).accept(accept);
    for (name, value) in params {
        builder = builder.parameter(name, value);
    }
    route.dispatch(&mut builder.build())
}

fn post(host: &RouteTable, body: &str) -> MemoryResponse {
    let Some((route, _)) = host.find(HttpMethod::Post, "/items") else {
        panic!("no route for /items");
    };
    let mut transport = MemoryTransport::builder()
        .protocol("HTTPS")
        .accept("application/json")
        .content_type("application/json")
        .body(body)
        .build();
    route.dispatch(&mut transport)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Contract Flow Demo ===\n");

    let config = EngineConfig::from_toml_str(CONFIG)?;
    let engine = ContractEngine::new(config, registry());
    let mut host = RouteTable::new();
    let routes = engine.add_configured_routes(&mut host)?;
    println!("registered {} routes\n", routes.len());

    print_response("GET over HTTPS", &get(&host, "/items/42", "HTTPS", "application/json"));
    print_response("GET as XML", &get(&host, "/items/42", "HTTPS", "application/xml"));
    print_response("GET over plain HTTP", &get(&host, "/items/42", "HTTP", "application/json"));
    print_response("GET with bad id", &get(&host, "/items/0", "HTTPS", "application/json"));
    print_response("GET unknown item", &get(&host, "/items/7", "HTTPS", "application/json"));
    print_response("GET without Accept", &get(&host, "/items/42", "HTTPS", ""));
    print_response("GET asking for CSV", &get(&host, "/items/42", "HTTPS", "text/csv"));

    print_response("POST valid", &post(&host, r#"{"name": "Shelf", "price": 20}"#));
    print_response("POST invalid", &post(&host, r#"{"name": "", "price": -1}"#));
    print_response("POST truncated", &post(&host, r#"{"name": "Sh"#));

    println!("=== Demo Complete ===");
    Ok(())
}
