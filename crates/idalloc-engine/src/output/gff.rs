//! Annotation (GFF3) file rewriter
//!
//! Streams the annotation file line by line. Feature lines (9 tab-separated
//! columns with an allowed type in column 3) get their `ID=` and `Parent=`
//! attribute tokens replaced with the allocated identifiers, when the
//! collection knows a mapping. Everything else, including unmatched tokens
//! and non-feature lines, passes through verbatim.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use idalloc_common::Result;
use regex::{Captures, Regex};
use tracing::info;

use crate::collection::EventCollection;

/// Feature types whose lines are eligible for rewriting
const ALLOWED_FEATURES: [&str; 8] = [
    "gene",
    "mRNA",
    "CDS",
    "exon",
    "pseudogene",
    "pseudogenic_transcript",
    "ncRNA_gene",
    "tRNA",
];

pub struct GffRewriter {
    allowed_features: HashSet<String>,
    id_pattern: Regex,
    parent_pattern: Regex,
}

impl Default for GffRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl GffRewriter {
    pub fn new() -> Self {
        Self::with_allowed_features(ALLOWED_FEATURES.iter().map(|s| s.to_string()))
    }

    pub fn with_allowed_features(features: impl IntoIterator<Item = String>) -> Self {
        // The key must start the attribute column or follow a `;`, so longer
        // keys such as `geneID=` never match. Both patterns are literals;
        // compilation cannot fail.
        let id_pattern = Regex::new(r"([\t;])ID=[^;]*;").expect("literal pattern");
        let parent_pattern = Regex::new(r"([\t;])Parent=[^;]*;").expect("literal pattern");

        Self {
            allowed_features: features.into_iter().collect(),
            id_pattern,
            parent_pattern,
        }
    }

    /// Rewrite an annotation file, returning the number of lines that had
    /// at least one identifier substituted.
    pub fn rewrite(
        &self,
        collection: &EventCollection,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<usize> {
        let reader = BufReader::new(File::open(input.as_ref())?);
        let mut writer = BufWriter::new(File::create(output.as_ref())?);
        let mut rewritten = 0;

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim_end();
            let fields: Vec<&str> = trimmed.split('\t').collect();

            if fields.len() == 9 && self.allowed_features.contains(fields[2]) {
                let (source_id, source_parent) = Self::extract_ids(fields[2], fields[8]);
                let allocated_id =
                    source_id.as_deref().and_then(|id| collection.allocated_id_for(id));
                let allocated_parent = source_parent
                    .as_deref()
                    .and_then(|id| collection.allocated_id_for(id));

                let updated = self.substitute(trimmed, allocated_id, allocated_parent);
                if updated != trimmed {
                    rewritten += 1;
                }
                writeln!(writer, "{updated}")?;
            } else {
                writeln!(writer, "{trimmed}")?;
            }
        }

        writer.flush()?;
        info!(
            lines = rewritten,
            output = %output.as_ref().display(),
            "Rewrote annotation file"
        );
        Ok(rewritten)
    }

    /// Extract the feature's own id and its parent id from the attribute
    /// column. CDS lines carry no identifier of their own in the event
    /// tables; they are addressed as `<Parent>-CDS`.
    fn extract_ids(feature_type: &str, attribute_column: &str) -> (Option<String>, Option<String>) {
        let attributes = Self::parse_attributes(attribute_column);

        let mut gff_id = attributes.get("ID").cloned();
        let parent = attributes.get("Parent").cloned();
        if feature_type == "CDS" {
            if let Some(ref parent_id) = parent {
                gff_id = Some(format!("{parent_id}-CDS"));
            }
        }

        (gff_id, parent)
    }

    /// Parse the `key=value` pairs of a GFF attribute column
    fn parse_attributes(attribute_column: &str) -> HashMap<String, String> {
        attribute_column
            .split(';')
            .filter(|field| !field.is_empty())
            .filter_map(|field| {
                field
                    .split_once('=')
                    .map(|(key, value)| (key.to_string(), value.to_string()))
            })
            .collect()
    }

    fn substitute(
        &self,
        line: &str,
        allocated_id: Option<&str>,
        allocated_parent: Option<&str>,
    ) -> String {
        let mut updated = line.to_string();

        if let Some(id) = allocated_id {
            updated = self
                .id_pattern
                .replace_all(&updated, |caps: &Captures<'_>| {
                    format!("{}ID={id};", &caps[1])
                })
                .into_owned();
        }

        if let Some(parent) = allocated_parent {
            updated = self
                .parent_pattern
                .replace_all(&updated, |caps: &Captures<'_>| {
                    format!("{}Parent={parent};", &caps[1])
                })
                .into_owned();
        }

        updated
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_and_parent() {
        let (id, parent) = GffRewriter::extract_ids(
            "mRNA",
            "owner=none;Parent=ABC001;ID=ABC001_R001;date_last_modified=2020-01-09;",
        );
        assert_eq!(id.as_deref(), Some("ABC001_R001"));
        assert_eq!(parent.as_deref(), Some("ABC001"));
    }

    #[test]
    fn gene_line_has_no_parent() {
        let (id, parent) =
            GffRewriter::extract_ids("gene", "owner=none;ID=ABC001;date_last_modified=2020-01-09;");
        assert_eq!(id.as_deref(), Some("ABC001"));
        assert_eq!(parent, None);
    }

    #[test]
    fn cds_id_derives_from_parent() {
        let (id, parent) =
            GffRewriter::extract_ids("CDS", "Parent=ABC001_R001;ID=whatever;Name=");
        assert_eq!(id.as_deref(), Some("ABC001_R001-CDS"));
        assert_eq!(parent.as_deref(), Some("ABC001_R001"));
    }

    #[test]
    fn attribute_parsing_skips_malformed_fields() {
        let attributes =
            GffRewriter::parse_attributes("ID=ABC001;Name=;broken;Parent=XYZ");
        assert_eq!(attributes.get("ID").map(String::as_str), Some("ABC001"));
        assert_eq!(attributes.get("Name").map(String::as_str), Some(""));
        assert_eq!(attributes.get("Parent").map(String::as_str), Some("XYZ"));
        assert!(!attributes.contains_key("broken"));
    }

    #[test]
    fn substitution_touches_only_matched_tokens() {
        let rewriter = GffRewriter::new();
        let line = "KB704696\tVectorBase\tgene\t757672\t778992\t.\t+\t.\towner=none;ID=ABC001;date_last_modified=2020-01-09;";

        let updated = rewriter.substitute(line, Some("NEW001"), None);
        assert_eq!(
            updated,
            "KB704696\tVectorBase\tgene\t757672\t778992\t.\t+\t.\towner=none;ID=NEW001;date_last_modified=2020-01-09;"
        );

        // Without a mapping the line passes through untouched.
        assert_eq!(rewriter.substitute(line, None, None), line);
    }

    #[test]
    fn substitution_respects_key_boundaries_and_replaces_every_occurrence() {
        let rewriter = GffRewriter::new();

        // `geneID=` is a different key and must survive; the genuine `ID=`
        // key is replaced wherever it appears in the column.
        let line = "KB704696\tVectorBase\tgene\t1\t100\t.\t+\t.\tgeneID=KEEP;ID=OLD;Name=x;ID=OLD;";
        let updated = rewriter.substitute(line, Some("NEW001"), None);
        assert_eq!(
            updated,
            "KB704696\tVectorBase\tgene\t1\t100\t.\t+\t.\tgeneID=KEEP;ID=NEW001;Name=x;ID=NEW001;"
        );

        // A column starting directly with the key is still matched.
        let line = "KB704696\tVectorBase\tgene\t1\t100\t.\t+\t.\tID=OLD;Name=x;";
        let updated = rewriter.substitute(line, Some("NEW001"), None);
        assert_eq!(
            updated,
            "KB704696\tVectorBase\tgene\t1\t100\t.\t+\t.\tID=NEW001;Name=x;"
        );
    }
}
