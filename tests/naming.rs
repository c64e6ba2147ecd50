#![allow(missing_docs)]

use std::sync::Arc;

use file_uploader::{
    naming::{decode_filename, sanitize_filename},
    BoxError, NameGenerator, NamingError, NamingResolver, RandomName, RequestContext, UploadRequest,
    UploadedPart,
};
use serde_json::json;

#[test]
fn decoding_is_utf8_percent_decoding() {
    assert_eq!(decode_filename("hello%20world.txt").expect("decode"), "hello world.txt");
    assert_eq!(decode_filename("%C3%A9t%C3%A9.txt").expect("decode"), "été.txt");
    assert_eq!(decode_filename("plain.txt").expect("decode"), "plain.txt");
}

#[test]
fn decoding_the_same_declared_name_is_stable() {
    let resolver = NamingResolver::default();
    let context = RequestContext::default();

    let first = resolver.resolve("a", "report%202024.pdf", &context).expect("first");
    let second = resolver.resolve("a", "report%202024.pdf", &context).expect("second");
    assert_eq!(first, second);
}

#[test]
fn decoding_keeps_path_separators() {
    assert_eq!(decode_filename("..%2Fescape.txt").expect("decode"), "../escape.txt");
}

#[test]
fn invalid_utf8_is_a_naming_error() {
    let err = decode_filename("%FF.txt").expect_err("0xFF is not UTF-8");
    assert!(matches!(err, NamingError::InvalidEncoding { filename } if filename == "%FF.txt"));
}

#[test]
fn generator_receives_declared_name_and_request_context() {
    let generator = |filename: &str, context: &RequestContext| -> Result<String, BoxError> {
        let id = context.params["id"].as_str().unwrap_or("none");
        Ok(format!("{id}-{filename}"))
    };
    let resolver = NamingResolver::new(Some(Arc::new(generator)));
    let context = RequestContext {
        params: json!({ "id": "42" }),
        ..RequestContext::default()
    };

    assert!(resolver.has_generator());
    assert_eq!(
        resolver.resolve("doc", "a%20b.txt", &context).expect("generated"),
        "42-a%20b.txt"
    );
}

#[test]
fn generator_failure_names_the_field() {
    let generator = |_: &str, _: &RequestContext| -> Result<String, BoxError> { Err("boom".into()) };
    let resolver = NamingResolver::new(Some(Arc::new(generator)));

    let err = resolver
        .resolve("avatar", "a.png", &RequestContext::default())
        .expect_err("generator fails");
    assert!(matches!(&err, NamingError::Generator { field, .. } if field == "avatar"));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn batch_resolution_fails_when_any_name_fails() {
    let generator = |filename: &str, _: &RequestContext| -> Result<String, BoxError> {
        if filename == "a.txt" {
            Err("rejected".into())
        } else {
            Ok(format!("gen-{filename}"))
        }
    };
    let resolver = NamingResolver::new(Some(Arc::new(generator)));
    let request = UploadRequest::new()
        .with_part("a", UploadedPart::from_bytes("1").with_filename("a.txt"))
        .with_part("b", UploadedPart::from_bytes("2").with_filename("b.txt"));

    let err = resolver
        .resolve_all(&request.payload, &request.context)
        .expect_err("one failure fails the batch");
    assert!(matches!(err, NamingError::Generator { field, .. } if field == "a"));
}

#[test]
fn batch_resolution_without_generator_decodes_every_name() {
    let request = UploadRequest::new()
        .with_part("a", UploadedPart::from_bytes("1").with_filename("a%201.txt"))
        .with_part("b", UploadedPart::from_bytes("2").with_filename("b.txt"));

    let names = NamingResolver::default()
        .resolve_all(&request.payload, &request.context)
        .expect("decoding succeeds");
    assert_eq!(names.len(), 2);
    assert_eq!(names["a"], "a 1.txt");
    assert_eq!(names["b"], "b.txt");
}

#[test]
fn random_name_keeps_extension_and_differs_per_call() {
    let context = RequestContext::default();
    let first = RandomName.generate("photo.final.PNG", &context).expect("generate");
    let second = RandomName.generate("photo.final.PNG", &context).expect("generate");

    assert!(first.ends_with(".PNG"));
    assert_eq!(first.len(), 32 + ".PNG".len());
    assert_ne!(first, second);

    let bare = RandomName.generate("README", &context).expect("generate");
    assert_eq!(bare.len(), 32);
    assert!(!bare.contains('.'));
}

#[test]
fn sanitize_strips_directories_and_unsafe_characters() {
    assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
    assert_eq!(sanitize_filename("bad:name?.txt"), "bad_name_.txt");
    assert_eq!(sanitize_filename("été.txt"), "_t_.txt");
    assert_eq!(sanitize_filename(".."), "file");
    assert_eq!(sanitize_filename(""), "file");
}
