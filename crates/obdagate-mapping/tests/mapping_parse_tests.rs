use obdagate_mapping::{parse_mapping_document, render_mapping_document, RenderedBlock};

const TEMPLATE: &str = r#"[PrefixDeclaration]
:		http://example.org/hereditary#
bto:	http://example.org/bto#
xsd:	http://www.w3.org/2001/XMLSchema#

[MappingDeclaration] @collection [[
mappingId	patient
target		:patient/{patient_id} a :Patient ; bto:age {age}^^xsd:integer .
source		SELECT patient_id, age FROM "patients"

mappingId	patient-alive
target		:patient/{patient_id} bto:alive {alive}^^xsd:boolean .
source		SELECT patient_id, alive FROM "patients" WHERE alive IS NOT NULL

mappingId	diagnosis
target		:patient/{patient_id} bto:diagnosis :dx/{code} .
source		SELECT patient_id, code
			FROM "diagnoses"
			WHERE confirmed = 1 AND NOT isnan(score)
]]
"#;

#[test]
fn parses_a_realistic_template() {
    let doc = parse_mapping_document(TEMPLATE).expect("parse");
    assert!(doc.is_complete(), "failures: {:?}", doc.failures);
    assert_eq!(
        doc.blocks.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
        vec!["patient", "patient-alive", "diagnosis"]
    );

    let alive = doc.block("patient-alive").unwrap();
    assert_eq!(alive.placeholders, vec!["patient_id", "alive"]);
    assert_eq!(alive.target_arity, 2);

    let dx = doc.block("diagnosis").unwrap();
    assert_eq!(dx.default_table.as_deref(), Some("diagnoses"));
    assert_eq!(dx.placeholders, vec!["patient_id", "code", "confirmed", "score"]);
    assert_eq!(dx.target_placeholders(), ["patient_id", "code"]);
    assert!(dx.source.contains("WHERE confirmed = 1"));
}

#[test]
fn header_survives_a_render_cycle() {
    let doc = parse_mapping_document(TEMPLATE).expect("parse");
    let blocks: Vec<RenderedBlock> = doc.blocks.iter().map(RenderedBlock::from).collect();
    let text = render_mapping_document(&doc.header, &blocks);
    let again = parse_mapping_document(&text).expect("reparse");
    assert_eq!(again.header.trim(), doc.header.trim());
    assert_eq!(again.blocks.len(), doc.blocks.len());
    for (before, after) in doc.blocks.iter().zip(again.blocks.iter()) {
        assert_eq!(after.id, before.id);
        assert_eq!(after.target, before.target);
        assert_eq!(after.source, before.source);
        assert_eq!(after.placeholders, before.placeholders);
    }
}
