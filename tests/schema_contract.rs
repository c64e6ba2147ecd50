#![allow(missing_docs)]

use file_uploader::{
    mime_table::{extension_for_mime, extensions_for_mime, mime_for_extension},
    schema::ContentTypeRule,
    ConfigError, SchemaBuilder, UploadRequest, UploadedPart, ValidationError, ValidationOptions,
};
use http::header;
use serde_json::{json, Value};

fn text_part(filename: &str) -> UploadedPart {
    UploadedPart::from_bytes("hello")
        .with_filename(filename)
        .with_content_type("text/plain")
}

#[test]
fn conflicting_allowlists_never_build_a_contract() {
    let result = SchemaBuilder::new(
        ValidationOptions::new()
            .extensions(["txt"])
            .mime_types(["text/plain"]),
    )
    .build();

    assert!(matches!(result, Err(ConfigError::ConflictingAllowLists)));
}

#[test]
fn unmapped_extensions_are_dropped_from_allowed_set() {
    let contract = SchemaBuilder::new(
        ValidationOptions::new().extensions(["pdf", ".TXT", "definitely-not-an-extension"]),
    )
    .build()
    .expect("unmapped extensions are not an error");

    let ContentTypeRule::OneOf(allowed) = &contract.payload.file.content_type else {
        panic!("extensions should constrain the content type");
    };
    assert_eq!(
        allowed.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["application/pdf", "text/plain"]
    );
}

#[test]
fn fully_unmapped_extension_list_rejects_every_content_type() {
    let contract = SchemaBuilder::new(ValidationOptions::new().extensions(["no-such-ext"]))
        .build()
        .expect("contract should build");

    let request = UploadRequest::new().with_part("a", text_part("x.txt"));
    assert!(matches!(
        contract.validate(&request),
        Err(ValidationError::ContentTypeNotAllowed { .. })
    ));
}

#[test]
fn content_type_is_unconstrained_without_allowlists() {
    let contract = SchemaBuilder::default().build().expect("contract should build");
    assert_eq!(contract.payload.file.content_type, ContentTypeRule::Any);

    let part = UploadedPart::from_bytes("{}")
        .with_filename("x.bin")
        .with_content_type("application/x-anything");
    let request = UploadRequest::new().with_part("a", part);
    assert!(contract.validate(&request).is_ok());
}

#[test]
fn disallowed_content_type_fails_validation() {
    let contract = SchemaBuilder::new(ValidationOptions::new().extensions(["pdf"]))
        .build()
        .expect("contract should build");

    let request = UploadRequest::new().with_part("a", text_part("x.txt"));
    let err = contract.validate(&request).expect_err("text/plain is not a pdf");
    assert_eq!(
        err,
        ValidationError::ContentTypeNotAllowed {
            field: "a".to_owned(),
            content_type: "text/plain".to_owned(),
        }
    );
}

#[test]
fn content_type_parameters_do_not_affect_matching() {
    let contract = SchemaBuilder::new(ValidationOptions::new().mime_types(["Text/Plain"]))
        .build()
        .expect("contract should build");

    let part = UploadedPart::from_bytes("hi")
        .with_filename("x.txt")
        .with_content_type("text/plain; charset=utf-8");
    let request = UploadRequest::new().with_part("a", part);
    assert!(contract.validate(&request).is_ok());
}

#[test]
fn payload_must_hold_exactly_one_entry_by_default() {
    let contract = SchemaBuilder::default().build().expect("contract should build");

    let empty = UploadRequest::new();
    assert_eq!(
        contract.validate(&empty),
        Err(ValidationError::EntryCount { min: 1, max: 1, actual: 0 })
    );

    let two = UploadRequest::new()
        .with_part("a", text_part("a.txt"))
        .with_part("b", text_part("b.txt"));
    assert_eq!(
        contract.validate(&two),
        Err(ValidationError::EntryCount { min: 1, max: 1, actual: 2 })
    );
}

#[test]
fn max_parts_relaxes_entry_count() {
    let contract = SchemaBuilder::new(ValidationOptions::new().max_parts(2))
        .build()
        .expect("contract should build");

    let two = UploadRequest::new()
        .with_part("a", text_part("a.txt"))
        .with_part("b", text_part("b.txt"));
    assert!(contract.validate(&two).is_ok());
}

#[test]
fn filename_is_required_and_non_empty_by_default() {
    let contract = SchemaBuilder::default().build().expect("contract should build");

    let missing = UploadedPart::from_bytes("x")
        .with_content_type("text/plain")
        .with_header(header::CONTENT_DISPOSITION, "form-data; filename=\"\"");
    let request = UploadRequest::new().with_part("a", missing);
    assert!(matches!(
        contract.validate(&request),
        Err(ValidationError::InvalidFilename { .. })
    ));

    let request = UploadRequest::new().with_part("a", text_part(""));
    assert!(matches!(
        contract.validate(&request),
        Err(ValidationError::InvalidFilename { .. })
    ));
}

#[test]
fn custom_filename_rule_replaces_default() {
    let contract = SchemaBuilder::new(ValidationOptions::new().filename_rule(|value: &Value| {
        if value == &json!("mock") {
            Ok(())
        } else {
            Err("filename must be `mock`".to_owned())
        }
    }))
    .build()
    .expect("contract should build");

    let accepted = UploadRequest::new().with_part("a", text_part("mock"));
    assert!(contract.validate(&accepted).is_ok());

    let rejected = UploadRequest::new().with_part("a", text_part("other.txt"));
    assert_eq!(
        contract.validate(&rejected),
        Err(ValidationError::InvalidFilename {
            field: "a".to_owned(),
            reason: "filename must be `mock`".to_owned(),
        })
    );
}

#[test]
fn content_disposition_must_carry_filename_token() {
    let contract = SchemaBuilder::default().build().expect("contract should build");

    let part = text_part("x.txt").with_header(header::CONTENT_DISPOSITION, "form-data; name=\"a\"");
    let request = UploadRequest::new().with_part("a", part);
    assert!(matches!(
        contract.validate(&request),
        Err(ValidationError::MissingDispositionFilename { .. })
    ));

    let part = text_part("x.txt").without_header(header::CONTENT_DISPOSITION);
    let request = UploadRequest::new().with_part("a", part);
    assert!(matches!(
        contract.validate(&request),
        Err(ValidationError::MissingDispositionFilename { .. })
    ));
}

#[test]
fn content_type_header_is_required() {
    let contract = SchemaBuilder::default().build().expect("contract should build");

    let part = UploadedPart::from_bytes("x").with_filename("x.txt");
    let request = UploadRequest::new().with_part("a", part);
    assert!(matches!(
        contract.validate(&request),
        Err(ValidationError::MissingContentType { .. })
    ));
}

#[test]
fn entry_without_stream_fails_validation() {
    let contract = SchemaBuilder::default().build().expect("contract should build");

    let mut part = text_part("x.txt");
    let _ = part.take_stream();
    let request = UploadRequest::new().with_part("a", part);
    assert_eq!(
        contract.validate(&request),
        Err(ValidationError::MissingStream { field: "a".to_owned() })
    );
}

#[test]
fn pass_through_section_rules_run_against_request_sections() {
    let contract = SchemaBuilder::new(
        ValidationOptions::new()
            .params_rule(|value: &Value| {
                value
                    .get("id")
                    .and_then(Value::as_str)
                    .map(|_| ())
                    .ok_or_else(|| "id is required".to_owned())
            })
            .auth_rule(|_: &Value| Ok(())),
    )
    .build()
    .expect("contract should build");
    assert!(contract.auth.is_some());
    assert!(contract.query.is_none());

    let rejected = UploadRequest::new().with_part("a", text_part("x.txt"));
    assert_eq!(
        contract.validate(&rejected),
        Err(ValidationError::Section {
            section: "params",
            reason: "id is required".to_owned(),
        })
    );

    let accepted = UploadRequest::new()
        .with_params(json!({ "id": "42" }))
        .with_part("a", text_part("x.txt"));
    assert!(contract.validate(&accepted).is_ok());
}

#[test]
fn allowed_extensions_round_trip_through_mime_types() {
    for ext in ["txt", "pdf", "png", "jpeg", "json", "csv", "html"] {
        let mime = mime_for_extension(ext).expect("extension should map");
        let back = extension_for_mime(&mime).expect("mime should map back");
        assert_eq!(
            mime_for_extension(&back).as_deref(),
            Some(mime.as_str()),
            "{ext} -> {mime} -> {back}"
        );
        assert!(extensions_for_mime(&mime).contains(&back) || back == ext);
    }
}

#[test]
fn reverse_lookup_ignores_parameters_and_misses_unknown_types() {
    assert_eq!(extension_for_mime("text/plain; charset=utf-8").as_deref(), Some("txt"));
    assert_eq!(extension_for_mime("application/x-file-uploader-unknown"), None);
    assert_eq!(extension_for_mime("not a mime"), None);
    assert_eq!(mime_for_extension(""), None);
}
