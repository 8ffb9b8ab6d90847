//! Output file naming.
//!
//! Every artifact name derives from [`ARTIFACTS`]:
//! `{source}_{abbr}[_placebo]_{kind}.{ext}` per category, plus
//! `{source}[_placebo]_did_table.tex` per source.

use std::path::{Path, PathBuf};

use ucr_core::{CrimeCategory, DataSource};

/// Per-category artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Yearly effect sizes (`year,mean,se`).
    EffectSize,
    /// Overall ATT column (Mean, SE).
    SimpleAtt,
    /// Event-study figure and its JSON artifact.
    EventStudy,
    /// Effect-size LaTeX table.
    Table,
}

/// Kind → file-name stem and extensions written.
pub const ARTIFACTS: &[(ArtifactKind, &str, &[&str])] = &[
    (ArtifactKind::EffectSize, "effect_size", &["csv"]),
    (ArtifactKind::SimpleAtt, "simple_att", &["csv"]),
    (ArtifactKind::EventStudy, "event_study", &["svg", "png", "json"]),
    (ArtifactKind::Table, "table", &["tex"]),
];

impl ArtifactKind {
    fn entry(self) -> (&'static str, &'static [&'static str]) {
        ARTIFACTS
            .iter()
            .find(|(k, _, _)| *k == self)
            .map(|(_, stem, exts)| (*stem, *exts))
            .unwrap_or(("", &[]))
    }

    /// File-name stem, e.g. `effect_size`.
    pub fn stem(self) -> &'static str {
        self.entry().0
    }

    /// Extensions written for this kind.
    pub fn extensions(self) -> &'static [&'static str] {
        self.entry().1
    }

    /// Primary extension.
    pub fn extension(self) -> &'static str {
        self.extensions().first().copied().unwrap_or("txt")
    }
}

/// Name builder for one (source, placebo) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputNames {
    pub source: DataSource,
    pub placebo: bool,
}

impl OutputNames {
    pub fn new(source: DataSource, placebo: bool) -> Self {
        Self { source, placebo }
    }

    fn placebo_tag(&self) -> &'static str {
        if self.placebo { "_placebo" } else { "" }
    }

    /// `{source}_{abbr}[_placebo]_{kind}.{ext}`
    pub fn file(&self, category: CrimeCategory, kind: ArtifactKind, ext: &str) -> String {
        format!(
            "{}_{}{}_{}.{}",
            self.source.tag(),
            category.abbreviation(),
            self.placebo_tag(),
            kind.stem(),
            ext
        )
    }

    /// File with the kind's primary extension.
    pub fn primary(&self, category: CrimeCategory, kind: ArtifactKind) -> String {
        self.file(category, kind, kind.extension())
    }

    /// `{source}[_placebo]_did_table.tex`
    pub fn master_table(&self) -> String {
        format!("{}{}_did_table.tex", self.source.tag(), self.placebo_tag())
    }

    /// Same naming for another source (comparison tables).
    pub fn for_source(&self, source: DataSource) -> Self {
        Self { source, ..*self }
    }

    pub fn path(&self, dir: &Path, category: CrimeCategory, kind: ArtifactKind) -> PathBuf {
        dir.join(self.primary(category, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_the_table() {
        let n = OutputNames::new(DataSource::Fbi, false);
        assert_eq!(
            n.primary(CrimeCategory::AggAssault, ArtifactKind::EffectSize),
            "fbi_aa_effect_size.csv"
        );
        assert_eq!(
            n.file(CrimeCategory::Rape, ArtifactKind::EventStudy, "png"),
            "fbi_p_event_study.png"
        );
        assert_eq!(n.primary(CrimeCategory::Theft, ArtifactKind::Table), "fbi_t_table.tex");
        assert_eq!(n.master_table(), "fbi_did_table.tex");

        let p = OutputNames::new(DataSource::Alternative, true);
        assert_eq!(
            p.primary(CrimeCategory::Crime, ArtifactKind::SimpleAtt),
            "alt_c_placebo_simple_att.csv"
        );
        assert_eq!(p.master_table(), "alt_placebo_did_table.tex");
        assert_eq!(p.for_source(DataSource::Fbi).master_table(), "fbi_placebo_did_table.tex");
    }

    #[test]
    fn every_kind_has_an_entry() {
        for kind in [
            ArtifactKind::EffectSize,
            ArtifactKind::SimpleAtt,
            ArtifactKind::EventStudy,
            ArtifactKind::Table,
        ] {
            assert!(!kind.stem().is_empty());
            assert!(!kind.extensions().is_empty());
        }
    }
}
