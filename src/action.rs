// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Action record builder.
//!
//! Assembles, over one evaluation pass, the document describing which
//! datapoints contributed and their old/new values:
//!
//! ```text
//! {"pump":[{"Temperature":{"lastValue":20,"value":21}},{"rpm":{"lastValue":null,"value":900}}]}
//! ```
//!
//! Values arrive as already serialised text and are spliced in verbatim;
//! the builder never parses what it holds.

/// Incremental builder for the per-pass action record.
#[derive(Debug, Clone, Default)]
pub struct ActionRecordBuilder {
    document: String,
    /// Byte offset of the closing `]` of each asset's entry list, in
    /// document order.
    list_ends: Vec<(String, usize)>,
    entries: usize,
}

impl ActionRecordBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one contribution. The first contribution of a pass opens the
    /// document; later ones are appended to their asset's list in arrival
    /// order, without deduplication.
    pub fn begin_or_append(
        &mut self,
        asset: &str,
        alias: &str,
        value: &str,
        last_value: Option<&str>,
    ) {
        let entry = entry_text(alias, value, last_value);

        if self.document.is_empty() {
            self.document.push('{');
            self.open_list(asset, &entry);
            self.document.push('}');
        } else if let Some(index) = self.list_ends.iter().position(|(name, _)| name == asset) {
            let at = self.list_ends[index].1;
            let spliced = format!(",{}", entry);
            self.document.insert_str(at, &spliced);
            for (_, end) in &mut self.list_ends[index..] {
                *end += spliced.len();
            }
        } else {
            // Reopen the object: drop the closing brace, add a member, re-close
            self.document.pop();
            self.document.push(',');
            self.open_list(asset, &entry);
            self.document.push('}');
        }

        self.entries += 1;
    }

    fn open_list(&mut self, asset: &str, entry: &str) {
        self.document.push_str(&quoted(asset));
        self.document.push_str(":[");
        self.document.push_str(entry);
        self.list_ends.push((asset.to_string(), self.document.len()));
        self.document.push(']');
    }

    /// Number of contributions in the current document.
    pub fn len(&self) -> usize {
        self.entries
    }

    /// True when nothing was contributed since the last retrieval.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Current document, without consuming it.
    pub fn peek(&self) -> Option<&str> {
        if self.is_empty() {
            None
        } else {
            Some(&self.document)
        }
    }

    /// Take the assembled document, leaving the builder empty. `None` when
    /// nothing was contributed.
    pub fn retrieve_and_clear(&mut self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let document = std::mem::take(&mut self.document);
        self.clear();
        Some(document)
    }

    /// Discard the accumulated document.
    pub fn clear(&mut self) {
        self.document.clear();
        self.list_ends.clear();
        self.entries = 0;
    }
}

fn entry_text(alias: &str, value: &str, last_value: Option<&str>) -> String {
    format!(
        "{{{}:{{\"lastValue\":{},\"value\":{}}}}}",
        quoted(alias),
        last_value.unwrap_or("null"),
        value
    )
}

/// JSON string literal for a key.
fn quoted(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}
