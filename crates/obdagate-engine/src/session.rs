//! A mapping editing session: one template document plus the store holding
//! its instantiated counterpart.

use obdagate_catalog::SchemaCatalog;
use obdagate_mapping::{parse_mapping_document, MappingDocument};
use obdagate_storage::MappingStore;

use crate::error::{ReconcileError, RewriteError};
use crate::graph::{mapping_edges, MappingEdge};
use crate::reconcile::{reconcile, Reconciliation};
use crate::rewrite::{instantiate, Selection};

#[derive(Debug, Clone)]
pub struct MappingSession {
    template: MappingDocument,
    store: MappingStore,
}

impl MappingSession {
    /// Parse the template. Blocks that fail to parse are logged and left out.
    pub fn open(template_text: &str, store: MappingStore) -> Result<Self, ReconcileError> {
        let template = parse_mapping_document(template_text)?;
        for failure in &template.failures {
            tracing::warn!(
                line = failure.line,
                block = ?failure.mapping_id,
                message = %failure.message,
                "template block skipped"
            );
        }
        Ok(Self { template, store })
    }

    pub fn template(&self) -> &MappingDocument {
        &self.template
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    /// Reconcile the stored document against the live schema.
    ///
    /// The schema is read first; if that fails nothing is reconciled.
    pub fn reconcile(&self, catalog: &dyn SchemaCatalog) -> Result<Reconciliation, ReconcileError> {
        let schema = catalog.snapshot()?;
        let prior = match self.store.read_current() {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "instantiated document unreadable; treated as absent");
                None
            }
        };
        Ok(reconcile(&self.template.blocks, prior.as_deref(), &schema))
    }

    /// Instantiate with `selection` and replace the stored document.
    pub fn save(
        &self,
        selection: &Selection,
        catalog: &dyn SchemaCatalog,
    ) -> Result<String, RewriteError> {
        let schema = catalog.snapshot()?;
        let text = instantiate(&self.template.header, &self.template.blocks, selection, &schema)?;
        self.store.replace(&text)?;
        Ok(text)
    }

    pub fn graph(
        &self,
        selection: &Selection,
        catalog: &dyn SchemaCatalog,
    ) -> Result<Vec<MappingEdge>, ReconcileError> {
        let schema = catalog.snapshot()?;
        Ok(mapping_edges(&self.template.blocks, selection, &schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obdagate_catalog::InMemoryCatalog;

    const TEMPLATE: &str = "[PrefixDeclaration]\n:\thttp://example.org/#\n\n\
[MappingDeclaration] @collection [[\n\
mappingId\tpatient\n\
target\t\t:p/{id} :age {age} .\n\
source\t\tSELECT id, age FROM \"patients\"\n\
]]\n";

    #[test]
    fn reconcile_save_reconcile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::new(dir.path().join("instantiated.obda"));
        let session = MappingSession::open(TEMPLATE, store).unwrap();
        let catalog = InMemoryCatalog::default().with_table("uploads", &["Age", "PID"]);

        let first = session.reconcile(&catalog).unwrap();
        assert!(first.blocks[0].connections.is_empty());

        let selection: Selection = serde_json::from_str(
            r#"{"patient": {"table": "uploads", "connections": {"0": 1, "1": 0}}}"#,
        )
        .unwrap();
        let text = session.save(&selection, &catalog).unwrap();
        assert!(text.contains("target\t\t:p/{PID} :age {Age} ."));
        assert!(text.contains("source\t\tSELECT PID, Age FROM \"uploads\""));

        let second = session.reconcile(&catalog).unwrap();
        assert_eq!(second.into_selection(), selection);
    }

    #[test]
    fn schema_failure_aborts_before_anything_is_written() {
        struct Down;
        impl SchemaCatalog for Down {
            fn list_tables(&self) -> Result<Vec<String>, obdagate_catalog::SchemaUnavailable> {
                Err(obdagate_catalog::SchemaUnavailable::new("down"))
            }
            fn columns_of(&self, _: &str) -> Result<Vec<String>, obdagate_catalog::SchemaUnavailable> {
                Err(obdagate_catalog::SchemaUnavailable::new("down"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = MappingStore::new(dir.path().join("m.obda"));
        let session = MappingSession::open(TEMPLATE, store.clone()).unwrap();
        assert!(matches!(session.reconcile(&Down), Err(ReconcileError::Schema(_))));
        assert!(matches!(
            session.save(&Selection::new(), &Down),
            Err(RewriteError::Schema(_))
        ));
        assert_eq!(store.read_current().unwrap(), None);
    }
}
