//! Before/after fixture tests for the full normalization pipeline.
//!
//! Each test provides a minimal input document and verifies the output
//! after running [`oas_normalizer::normalize`] and
//! [`oas_normalizer::serialize`].

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Parse, normalize, serialize; return the output as parsed JSON.
fn run_pipeline(input: &str) -> Value {
    serde_json::from_str(&run_pipeline_text(input)).expect("output should parse")
}

fn run_pipeline_text(input: &str) -> String {
    let cancel = CancellationToken::new();
    let mut doc = oas_normalizer::parse_document(input).expect("input should parse");
    oas_normalizer::normalize(&mut doc, &cancel).expect("pipeline should succeed");
    oas_normalizer::serialize(&mut doc).expect("serialization should succeed")
}

/// Every `$ref` string anywhere in the value tree.
fn collect_refs(value: &Value, refs: &mut HashSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "$ref" {
                    if let Some(reference) = child.as_str() {
                        refs.insert(reference.to_string());
                    }
                }
                collect_refs(child, refs);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, refs);
            }
        }
        _ => {}
    }
}

fn schema_names(output: &Value) -> HashSet<String> {
    output["components"]["schemas"]
        .as_object()
        .map(|schemas| schemas.keys().cloned().collect())
        .unwrap_or_default()
}

fn operation_ids(output: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(paths) = output["paths"].as_object() {
        for item in paths.values() {
            let Some(item) = item.as_object() else {
                continue;
            };
            for (method, operation) in item {
                if matches!(
                    method.as_str(),
                    "get" | "post" | "put" | "patch" | "delete" | "head" | "options" | "trace"
                ) {
                    if let Some(id) = operation["operationId"].as_str() {
                        ids.push(id.to_string());
                    }
                }
            }
        }
    }
    ids
}

#[test]
fn primitive_components_are_inlined() {
    let output = run_pipeline(
        r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Email:
      type: string
      format: email
    User:
      type: object
      properties:
        addr:
          $ref: '#/components/schemas/Email'
",
    );

    assert!(output["components"]["schemas"]["Email"].is_null());
    let addr = &output["components"]["schemas"]["User"]["properties"]["addr"];
    assert_eq!(addr["type"], "string");
    assert_eq!(addr["format"], "email");

    let mut refs = HashSet::new();
    collect_refs(&output, &mut refs);
    assert!(!refs.contains("#/components/schemas/Email"));
}

#[test]
fn schema_colliding_with_operation_id_renamed() {
    let output = run_pipeline(
        r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths:
  /pet:
    post:
      operationId: Pet
      responses:
        '200':
          description: OK
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Pet'
components:
  schemas:
    Pet:
      type: object
      properties:
        name:
          type: string
",
    );

    let names = schema_names(&output);
    assert!(names.contains("PetBody"));
    assert!(!names.contains("Pet"));

    let mut refs = HashSet::new();
    collect_refs(&output, &mut refs);
    assert!(refs.contains("#/components/schemas/PetBody"));
}

#[test]
fn invalid_enum_default_snapped_to_member() {
    let output = run_pipeline(
        r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Level:
      type: string
      enum: [a, b]
      default: A
",
    );

    assert_eq!(output["components"]["schemas"]["Level"]["default"], "a");
}

#[test]
fn discriminator_synthesized_for_oneof() {
    let output = run_pipeline(
        r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Pet:
      oneOf:
        - $ref: '#/components/schemas/Cat'
        - $ref: '#/components/schemas/Dog'
    Cat:
      type: object
      properties:
        meow: {type: boolean}
    Dog:
      type: object
      properties:
        bark: {type: boolean}
",
    );

    let pet = &output["components"]["schemas"]["Pet"];
    assert_eq!(pet["discriminator"]["propertyName"], "type");
    assert_eq!(
        pet["discriminator"]["mapping"]["Cat"],
        "#/components/schemas/Cat"
    );
    assert_eq!(
        pet["discriminator"]["mapping"]["Dog"],
        "#/components/schemas/Dog"
    );
    assert_eq!(pet["properties"]["type"]["type"], "string");
    assert!(
        pet["required"]
            .as_array()
            .unwrap()
            .contains(&Value::String("type".to_string()))
    );
}

#[test]
fn enum_branch_under_discriminator_promoted() {
    let output = run_pipeline(
        r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Config:
      oneOf:
        - $ref: '#/components/schemas/Mode'
      discriminator:
        propertyName: kind
    Mode:
      type: string
      enum: [a, b]
",
    );

    let wrapper = &output["components"]["schemas"]["Mode_setting"];
    assert_eq!(wrapper["type"], "object");
    assert_eq!(
        wrapper["properties"]["value"]["$ref"],
        "#/components/schemas/Mode"
    );
    assert_eq!(wrapper["properties"]["kind"]["type"], "string");
    assert_eq!(wrapper["required"], serde_json::json!(["value"]));

    let config = &output["components"]["schemas"]["Config"];
    assert_eq!(
        config["oneOf"][0]["$ref"],
        "#/components/schemas/Mode_setting"
    );
}

#[test]
fn path_example_reference_retargeted() {
    let output = run_pipeline(
        r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths:
  /pets:
    post:
      operationId: createPet
      responses:
        '200':
          description: OK
          content:
            application/json:
              schema:
                $ref: '#/paths/~1pets/post/responses/200/content/application~1json/example'
",
    );

    let slot = &output["paths"]["/pets"]["post"]["responses"]["200"]["content"]
        ["application/json"]["schema"];
    assert_eq!(slot["$ref"], "#/components/schemas/ExamplePayload");
    assert_eq!(
        output["components"]["schemas"]["ExamplePayload"]["type"],
        "object"
    );
}

#[test]
fn cyclic_refs_terminate() {
    let output = run_pipeline(
        r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Node:
      type: object
      properties:
        next:
          $ref: '#/components/schemas/Node'
        label:
          type: string
",
    );

    assert_eq!(
        output["components"]["schemas"]["Node"]["properties"]["next"]["$ref"],
        "#/components/schemas/Node"
    );
}

#[test]
fn empty_document_runs_cleanly() {
    let output = run_pipeline(
        r"
openapi: 3.0.1
info: {title: Empty, version: '1'}
paths: {}
",
    );
    assert_eq!(output["openapi"], "3.0.1");
    // No paths survive; the only synthesized content is the bearer scheme.
    assert!(output["paths"].is_null());
    assert!(output["components"]["securitySchemes"]["bearerAuth"].is_object());
}

#[test]
fn all_enum_oneof_yields_wrappers_and_discriminator() {
    let output = run_pipeline(
        r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
components:
  schemas:
    Choice:
      oneOf:
        - $ref: '#/components/schemas/Speed'
        - $ref: '#/components/schemas/Color'
    Speed:
      type: string
      enum: [fast, slow]
    Color:
      type: string
      enum: [red, blue]
",
    );

    let names = schema_names(&output);
    assert!(names.contains("Speed_setting"));
    assert!(names.contains("Color_setting"));

    let choice = &output["components"]["schemas"]["Choice"];
    assert_eq!(choice["discriminator"]["propertyName"], "type");
    assert_eq!(
        choice["oneOf"][0]["$ref"],
        "#/components/schemas/Speed_setting"
    );
    assert_eq!(
        choice["oneOf"][1]["$ref"],
        "#/components/schemas/Color_setting"
    );
    assert_eq!(
        choice["discriminator"]["mapping"]["Speed"],
        "#/components/schemas/Speed_setting"
    );
}

/// A deliberately messy document exercising most passes at once.
const MESSY: &str = r#"
openapi: 3.0.0
info:
  title: 'Messy: the API'
  version: '1'
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        '200':
          description: OK
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/pet list'
        4xx:
          description: client error
    post:
      requestBody:
        content:
          application/json:
            schema:
              type: object
              properties:
                name: {type: string}
      responses:
        '200':
          description: ''
  /pets/{id}/toys/{id}:
    get:
      operationId: listPets
      parameters:
        - name: id
          in: path
          required: true
          schema: {type: string}
      responses:
        '200':
          description: OK
components:
  schemas:
    pet list:
      type: array
      items:
        type: object
        properties:
          name: {type: string}
          kind:
            type: string
            enum: [cat, dog]
            default: CAT
    Email:
      type: string
      format: email
    Owner:
      type: object
      properties:
        email:
          $ref: '#/components/schemas/Email'
        contact:
          $ref: '#/components/schemas/Missing'
"#;

#[test]
fn messy_document_satisfies_output_invariants() {
    let output = run_pipeline(MESSY);
    let names = schema_names(&output);

    // P2: every schema name is a strict identifier.
    for name in &names {
        assert!(
            oas_normalizer::naming::is_strict_identifier(name),
            "schema name {name:?} is not a strict identifier"
        );
    }

    // P3: operation ids unique case-insensitively and valid.
    let ids = operation_ids(&output);
    let mut seen = HashSet::new();
    for id in &ids {
        assert!(oas_normalizer::naming::is_valid_identifier(id));
        assert!(seen.insert(id.to_lowercase()), "duplicate operation id {id}");
    }

    // P4: schema names and operation ids are disjoint.
    let lowered: HashSet<String> = names.iter().map(|name| name.to_lowercase()).collect();
    for id in &ids {
        assert!(!lowered.contains(&id.to_lowercase()));
    }

    // P1 (modulo the known broken ref, which the scrub logs but keeps):
    // every ref except the deliberate one resolves.
    let mut refs = HashSet::new();
    collect_refs(&output, &mut refs);
    for reference in &refs {
        if reference == "#/components/schemas/Missing" {
            continue;
        }
        let name = reference.strip_prefix("#/components/schemas/").unwrap();
        assert!(names.contains(name), "unresolved reference {reference}");
    }

    // P6: the enum default snapped to a member.
    let mut found_enum_default = false;
    for (_, schema) in output["components"]["schemas"].as_object().unwrap() {
        if let Some(kind) = schema["properties"]["kind"].as_object() {
            assert_eq!(kind["default"], "cat");
            found_enum_default = true;
        }
    }
    assert!(found_enum_default, "promoted item schema should carry the enum");

    // Duplicate path parameter renamed.
    assert!(output["paths"]["/pets/{id}/toys/{id_2}"].is_object());

    // Status range alias uppercased.
    assert!(output["paths"]["/pets"]["get"]["responses"]["4XX"].is_object());

    // YAML-unsafe info title quoted.
    assert_eq!(output["info"]["title"], "\"Messy: the API\"");
}

#[test]
fn pipeline_is_idempotent() {
    let first = run_pipeline_text(MESSY);
    let second = run_pipeline_text(&first);
    assert_eq!(first, second);
}

#[test]
fn clean_input_keeps_names_and_refs() {
    let input = r"
openapi: 3.0.1
info: {title: Clean, version: '1'}
paths:
  /users:
    get:
      operationId: listUsers
      responses:
        '200':
          description: OK
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/UserPage'
components:
  schemas:
    UserPage:
      type: object
      properties:
        users:
          type: array
          items:
            $ref: '#/components/schemas/User'
    User:
      type: object
      properties:
        id: {type: string, format: uuid}
        name: {type: string}
";
    let output = run_pipeline(input);

    assert_eq!(
        schema_names(&output),
        HashSet::from(["UserPage".to_string(), "User".to_string()])
    );
    let mut refs = HashSet::new();
    collect_refs(&output, &mut refs);
    assert_eq!(
        refs,
        HashSet::from(["#/components/schemas/User".to_string()])
    );
}

#[test]
fn cancellation_propagates_and_leaves_no_output() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut doc = oas_normalizer::parse_document(
        r"
openapi: 3.0.1
info: {title: T, version: '1'}
paths: {}
",
    )
    .unwrap();
    let result = oas_normalizer::normalize(&mut doc, &cancel);
    assert!(matches!(result, Err(oas_normalizer::Error::Cancelled)));
}

#[test]
fn fix_does_not_write_target_when_cancelled() {
    let dir = std::env::temp_dir();
    let source = dir.join("oas_normalizer_pipeline_cancel_in.yaml");
    let target = dir.join("oas_normalizer_pipeline_cancel_out.json");
    std::fs::write(
        &source,
        "openapi: 3.0.1\ninfo: {title: T, version: '1'}\npaths: {}\n",
    )
    .unwrap();
    let _ = std::fs::remove_file(&target);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = oas_normalizer::fix(&source, &target, &cancel);

    assert!(matches!(result, Err(oas_normalizer::Error::Cancelled)));
    assert!(!target.exists(), "cancelled run must not write the target");
}

#[test]
fn fix_writes_target_file() {
    let dir = std::env::temp_dir();
    let source = dir.join("oas_normalizer_pipeline_in.yaml");
    let target = dir.join("oas_normalizer_pipeline_out.json");
    std::fs::write(
        &source,
        "openapi: 3.0.1\ninfo: {title: T, version: '1'}\npaths: {}\n",
    )
    .unwrap();

    let cancel = CancellationToken::new();
    oas_normalizer::fix(&source, &target, &cancel).unwrap();

    let written = std::fs::read_to_string(&target).unwrap();
    let parsed: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed["openapi"], "3.0.1");
}
