//! Integration tests for writing protected documents.
//!
//! Tests:
//! - Trailer and `/Encrypt` dictionary structure
//! - Strings and streams differ from the unprotected output
//! - RC4 output decrypts with the derived object key
//! - Invalid permission bits are rejected when protection is set
//! - Objects without strings or streams, or that do not parse, stay as read

mod common;

use common::{init_logger, object_body, sample_pdf, PdfBuilder, FONT};
use pdf_inject::encryption::{rc4_crypt, StandardSecurity};
use pdf_inject::object::Object;
use pdf_inject::parser::parse_payload;
use pdf_inject::{
    Algorithm, Alignment, DocumentEditor, EditorConfig, Error, Permissions, ProtectionConfig,
};

fn filled_editor() -> DocumentEditor {
    init_logger();
    let mut editor = DocumentEditor::from_bytes(&sample_pdf(1))
        .unwrap()
        .with_config(EditorConfig::default().with_compression(false));
    editor.register_font("mono", FONT.to_vec()).unwrap();
    editor.set_font("mono", 12.0).unwrap();
    editor
        .insert_text("Secret", 1, 50.0, 50.0, 200.0, 20.0, Alignment::default())
        .unwrap();
    editor
}

#[test]
fn test_trailer_references_encrypt_dictionary() {
    let mut editor = filled_editor();
    editor.set_protection(0, b"u", b"o").unwrap();
    let output = editor.to_bytes().unwrap();
    let text = String::from_utf8_lossy(&output);

    // 1..=6 original, 7..=11 font, 12 and 13 page streams, 14 /Encrypt.
    assert!(text.contains("/Size 15 /Root 1 0 R /Info 3 0 R /Encrypt 14 0 R /ID [() ()]"));
    let encrypt = parse_payload(&object_body(&output, 14).unwrap()).unwrap();
    let encrypt = encrypt.as_dict().unwrap();
    assert_eq!(encrypt["Filter"].as_name(), Some("Standard"));
    assert_eq!(encrypt["V"].as_integer(), Some(1));
    assert_eq!(encrypt["R"].as_integer(), Some(2));
    assert_eq!(encrypt["P"].as_integer(), Some(-64));
    assert_eq!(encrypt["O"].as_string().unwrap().len(), 32);
    assert_eq!(encrypt["U"].as_string().unwrap().len(), 32);
}

#[test]
fn test_strings_and_streams_are_encrypted() {
    let plain = filled_editor().to_bytes().unwrap();
    let mut editor = filled_editor();
    editor.set_protection(0, b"u", b"o").unwrap();
    let protected = editor.to_bytes().unwrap();

    // Info (strings), original content, font objects and new page streams.
    for id in [3, 6, 7, 8, 9, 11, 12, 13] {
        assert_ne!(
            object_body(&plain, id).unwrap(),
            object_body(&protected, id).unwrap(),
            "object {} left in the clear",
            id
        );
    }
    assert!(!String::from_utf8_lossy(&protected).contains("(Sample form)"));
}

#[test]
fn test_rc4_strings_decrypt_with_object_key() {
    let config = ProtectionConfig::new(0, b"u", b"o");
    let mut editor = filled_editor();
    editor.set_protection_with(config.clone()).unwrap();
    let protected = editor.to_bytes().unwrap();

    let info = parse_payload(&object_body(&protected, 3).unwrap()).unwrap();
    let title = info.as_dict().unwrap()["Title"].as_string().unwrap().to_vec();

    let handler = StandardSecurity::new(&config).unwrap().write_handler();
    let key = handler.derive_object_key(3, 0);
    assert_eq!(rc4_crypt(&key, &title), b"Sample form");
}

#[test]
fn test_rc4_output_is_repeatable() {
    let mut editor = filled_editor();
    editor.set_protection(0, b"u", b"o").unwrap();
    assert_eq!(editor.to_bytes().unwrap(), editor.to_bytes().unwrap());
}

#[test]
fn test_aes_encrypt_dictionary() {
    let mut editor = filled_editor();
    editor
        .set_protection_with(
            ProtectionConfig::new(0x0F3C, b"", b"owner").with_algorithm(Algorithm::Aes128),
        )
        .unwrap();
    let output = editor.to_bytes().unwrap();
    let encrypt = parse_payload(&object_body(&output, 14).unwrap()).unwrap();
    let encrypt = encrypt.as_dict().unwrap();
    assert_eq!(encrypt["V"].as_integer(), Some(4));
    assert_eq!(encrypt["StmF"].as_name(), Some("StdCF"));
    let std_cf = encrypt["CF"].as_dict().unwrap()["StdCF"].as_dict().unwrap();
    assert_eq!(std_cf["CFM"].as_name(), Some("AESV2"));

    // Each encrypted string starts with a 16 byte IV and is block aligned.
    let info = parse_payload(&object_body(&output, 3).unwrap()).unwrap();
    match &info.as_dict().unwrap()["Title"] {
        Object::String(data) => assert_eq!(data.len(), 32),
        other => panic!("title is {:?}", other),
    }
}

#[test]
fn test_rc4_128_allows_revision_3_flags() {
    let config = ProtectionConfig::new(
        (Permissions::PRINT | Permissions::FILL_FORMS).bits(),
        b"u",
        b"o",
    )
    .with_algorithm(Algorithm::Rc4_128);
    let mut editor = filled_editor();
    editor.set_protection_with(config.clone()).unwrap();
    let output = editor.to_bytes().unwrap();

    let encrypt = parse_payload(&object_body(&output, 14).unwrap()).unwrap();
    let encrypt = encrypt.as_dict().unwrap();
    assert_eq!(encrypt["V"].as_integer(), Some(2));
    assert_eq!(encrypt["R"].as_integer(), Some(3));
    assert_eq!(encrypt["Length"].as_integer(), Some(128));

    let info = parse_payload(&object_body(&output, 3).unwrap()).unwrap();
    let title = info.as_dict().unwrap()["Title"].as_string().unwrap().to_vec();
    let key = StandardSecurity::new(&config)
        .unwrap()
        .write_handler()
        .derive_object_key(3, 0);
    assert_eq!(key.len(), 16);
    assert_eq!(rc4_crypt(&key, &title), b"Sample form");
}

#[test]
fn test_invalid_permission_bits() {
    let mut editor = filled_editor();
    // Bit 1 is reserved.
    assert!(matches!(editor.set_protection(1, b"u", b"o"), Err(Error::Protection(_))));
    // Revision 2 only knows bits 3 to 6.
    assert!(matches!(editor.set_protection(1 << 8, b"u", b"o"), Err(Error::Protection(_))));
    assert!(!editor.is_protected());
}

#[test]
fn test_encrypted_output_is_rejected_as_input() {
    let mut editor = filled_editor();
    editor.set_protection(0, b"u", b"o").unwrap();
    let output = editor.to_bytes().unwrap();
    assert!(matches!(DocumentEditor::from_bytes(&output), Err(Error::Unsupported(_))));
}

#[test]
fn test_catalog_and_page_tree_stay_in_the_clear() {
    let plain = filled_editor().to_bytes().unwrap();
    let mut editor = filled_editor();
    editor.set_protection(0, b"u", b"o").unwrap();
    let protected = editor.to_bytes().unwrap();

    for id in [1, 2, 4] {
        assert_eq!(object_body(&plain, id), object_body(&protected, id));
    }
    assert_eq!(
        object_body(&protected, 1).unwrap(),
        b"<< /Type /Catalog /Pages 2 0 R >>"
    );
}

#[test]
fn test_unparseable_object_saves_with_protection() {
    init_logger();
    let input = PdfBuilder::new(1)
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .object(3, "<< /A 1 >> (x)")
        .build();
    let plain = DocumentEditor::from_bytes(&input).unwrap().to_bytes().unwrap();

    let mut editor = DocumentEditor::from_bytes(&input).unwrap();
    editor.set_protection(0, b"u", b"o").unwrap();
    let protected = editor.to_bytes().unwrap();

    assert_eq!(object_body(&plain, 3), object_body(&protected, 3));
    assert_eq!(object_body(&protected, 3).unwrap(), b"<< /A 1 >> (x)");
}
