//! Template -> identity selection -> instantiated document round trips.

use std::collections::HashSet;

use obdagate_catalog::SchemaSnapshot;
use obdagate_engine::{instantiate, reconcile, BlockSelection, ConnectionsMap, Selection};
use obdagate_mapping::parse_mapping_document;
use proptest::prelude::*;

/// A schema whose tables have exactly the template's placeholder names as
/// columns, and the selection binding each placeholder to its own column.
fn identity_setup(text: &str) -> (SchemaSnapshot, Selection) {
    let doc = parse_mapping_document(text).unwrap();
    let mut schema = SchemaSnapshot::default();
    let mut selection = Selection::new();
    for block in &doc.blocks {
        let table = block.default_table.clone().unwrap();
        let columns = schema.tables.entry(table.clone()).or_default();
        let mut connections = ConnectionsMap::new();
        for (idx, p) in block.placeholders.iter().enumerate() {
            let col = match columns.iter().position(|c| c == p) {
                Some(col) => col,
                None => {
                    columns.push(p.clone());
                    columns.len() - 1
                }
            };
            connections.insert(idx, col);
        }
        selection.insert(
            block.id.clone(),
            BlockSelection {
                table: Some(table),
                connections,
            },
        );
    }
    (schema, selection)
}

const TEMPLATE: &str = r#"[PrefixDeclaration]
:	http://example.org/hereditary#

[MappingDeclaration] @collection [[
mappingId	patient
target		:patient/{patient_id} a :Patient ; :age {age} .
source		SELECT patient_id, age FROM "patients" WHERE alive = 1

mappingId	visit
target		:visit/{visit_id} :of :patient/{patient_id} .
source		SELECT visit_id, patient_id
			FROM "visits"
			WHERE cancelled IS NULL
]]
"#;

#[test]
fn identity_connections_reproduce_the_template() {
    let template = parse_mapping_document(TEMPLATE).unwrap();
    let (schema, selection) = identity_setup(TEMPLATE);

    let text = instantiate(&template.header, &template.blocks, &selection, &schema).unwrap();
    let out = parse_mapping_document(&text).unwrap();

    assert!(out.is_complete());
    assert_eq!(out.blocks.len(), template.blocks.len());
    for (a, b) in template.blocks.iter().zip(&out.blocks) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.default_table, b.default_table);
        assert_eq!(a.placeholders, b.placeholders);
        assert_eq!(a.target, b.target);
        assert_eq!(a.source, b.source);
    }
}

#[test]
fn reconciling_an_identity_instantiation_recovers_the_selection() {
    let template = parse_mapping_document(TEMPLATE).unwrap();
    let (schema, selection) = identity_setup(TEMPLATE);
    let text = instantiate(&template.header, &template.blocks, &selection, &schema).unwrap();

    let rec = reconcile(&template.blocks, Some(&text), &schema);
    assert!(rec.blocks.iter().all(|b| b.unbound.is_empty()));
    assert_eq!(rec.into_selection(), selection);
}

fn ident() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z][a-z0-9]{0,6}").unwrap()
}

proptest! {
    #[test]
    fn identity_round_trip_holds_for_generated_blocks(
        vars in proptest::collection::vec(ident(), 1..6),
        filter in ident(),
    ) {
        let unique: Vec<String> = {
            let mut seen = HashSet::new();
            vars.into_iter().filter(|v| seen.insert(v.clone())).collect()
        };
        let target: Vec<String> = unique.iter().map(|v| format!(":has_{v} {{{v}}}")).collect();
        let text = format!(
            "[MappingDeclaration] @collection [[\nmappingId\tgen\ntarget\t\t:x/{{{}}} {} .\nsource\t\tSELECT {} FROM \"t\" WHERE {filter} = 1\n]]\n",
            unique[0],
            target.join(" ; "),
            unique.join(", "),
        );

        let template = parse_mapping_document(&text).unwrap();
        let (schema, selection) = identity_setup(&text);
        let out = instantiate(&template.header, &template.blocks, &selection, &schema).unwrap();
        let reparsed = parse_mapping_document(&out).unwrap();
        prop_assert_eq!(&reparsed.blocks[0].placeholders, &template.blocks[0].placeholders);
        prop_assert_eq!(&reparsed.blocks[0].source, &template.blocks[0].source);
    }
}
