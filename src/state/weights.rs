//! Trained weights reported by the service, used to seed new jobs.

use crate::client::default_pretrained;
use crate::state::ProcessKind;

/// Weight paths listed for each process kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightCatalog {
    sovits: Vec<String>,
    gpt: Vec<String>,
}

impl WeightCatalog {
    /// Replace the listing for `kind`.
    pub fn set(&mut self, kind: ProcessKind, paths: Vec<String>) {
        match kind {
            ProcessKind::Sovits => self.sovits = paths,
            ProcessKind::Gpt => self.gpt = paths,
        }
    }

    pub fn listed(&self, kind: ProcessKind) -> &[String] {
        match kind {
            ProcessKind::Sovits => &self.sovits,
            ProcessKind::Gpt => &self.gpt,
        }
    }

    /// What a new `kind` job may start from: the built-in pretrained
    /// checkpoint first, then every listed weight.
    pub fn choices(&self, kind: ProcessKind) -> Vec<&str> {
        let default = default_pretrained(kind);
        std::iter::once(default)
            .chain(
                self.listed(kind)
                    .iter()
                    .map(String::as_str)
                    .filter(|path| *path != default),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::model::{DEFAULT_PRETRAINED_S1, DEFAULT_PRETRAINED_S2G};
    use pretty_assertions::assert_eq;

    #[test]
    fn default_checkpoint_leads_the_choices() {
        let mut catalog = WeightCatalog::default();
        assert_eq!(catalog.choices(ProcessKind::Gpt), vec![DEFAULT_PRETRAINED_S1]);

        catalog.set(
            ProcessKind::Sovits,
            vec![
                "SoVITS_weights_v2/singer0_e8_s96.pth".to_string(),
                DEFAULT_PRETRAINED_S2G.to_string(),
            ],
        );
        assert_eq!(
            catalog.choices(ProcessKind::Sovits),
            vec![DEFAULT_PRETRAINED_S2G, "SoVITS_weights_v2/singer0_e8_s96.pth"]
        );
        assert!(catalog.listed(ProcessKind::Gpt).is_empty());
    }
}
