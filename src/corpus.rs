//! Flat-file corpus tables: document sections with token counts, and their embeddings.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QaError, Result};

/// Dense embedding vector as returned by the embedding service.
pub type Embedding = Vec<f64>;

const TITLE_COLUMN: &str = "title";
const HEADING_COLUMN: &str = "heading";

/// Composite `(title, heading)` identifier of a document section.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SectionKey {
    /// Document title.
    pub title: String,
    /// Heading of the section within the document.
    pub heading: String,
}

impl SectionKey {
    /// Builds a key from its two parts.
    pub fn new(title: impl Into<String>, heading: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            heading: heading.into(),
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.title, self.heading)
    }
}

/// One retrievable chunk of source text with its precomputed token count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSection {
    /// Section identifier.
    pub key: SectionKey,
    /// Raw section text.
    pub content: String,
    /// Token count of the whitespace-normalized content.
    pub tokens: usize,
}

impl DocumentSection {
    /// Creates a section record.
    pub fn new(key: SectionKey, content: impl Into<String>, tokens: usize) -> Self {
        Self {
            key,
            content: content.into(),
            tokens,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionRow {
    title: String,
    heading: String,
    content: String,
    tokens: usize,
}

impl From<SectionRow> for DocumentSection {
    fn from(row: SectionRow) -> Self {
        DocumentSection::new(SectionKey::new(row.title, row.heading), row.content, row.tokens)
    }
}

/// Reads the `title,heading,content,tokens` table in file order.
pub fn read_sections(path: &Path) -> Result<Vec<DocumentSection>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|err| QaError::Data(format!("failed to open {}: {err}", path.display())))?;
    let mut sections = Vec::new();
    for (idx, row) in reader.deserialize::<SectionRow>().enumerate() {
        let row = row.map_err(|err| {
            QaError::Data(format!(
                "invalid section row {} in {}: {err}",
                idx + 1,
                path.display()
            ))
        })?;
        sections.push(row.into());
    }
    Ok(sections)
}

/// Writes the `title,heading,content,tokens` table, header included even when empty.
pub fn write_sections<'a, I>(path: &Path, sections: I) -> Result<()>
where
    I: IntoIterator<Item = &'a DocumentSection>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|err| QaError::Data(format!("failed to create {}: {err}", path.display())))?;
    writer.write_record([TITLE_COLUMN, HEADING_COLUMN, "content", "tokens"])?;
    for section in sections {
        writer.serialize(SectionRow {
            title: section.key.title.clone(),
            heading: section.key.heading.clone(),
            content: section.content.clone(),
            tokens: section.tokens,
        })?;
    }
    writer.flush().map_err(QaError::data)?;
    Ok(())
}

/// Reads the `title,heading,0,1,..` embedding table.
///
/// Positional columns are resolved by their integer header, so column order in the
/// file does not matter, but every index from `0` to the largest one must be present.
pub fn read_embeddings(path: &Path) -> Result<BTreeMap<SectionKey, Embedding>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|err| QaError::Data(format!("failed to open {}: {err}", path.display())))?;
    let headers = reader.headers()?.clone();

    let mut title_col = None;
    let mut heading_col = None;
    let mut positional: BTreeMap<usize, usize> = BTreeMap::new();
    for (col, name) in headers.iter().enumerate() {
        match name {
            TITLE_COLUMN => title_col = Some(col),
            HEADING_COLUMN => heading_col = Some(col),
            other => {
                let dim: usize = other.trim().parse().map_err(|_| {
                    QaError::Data(format!(
                        "unexpected column '{other}' in {}; expected a dimension index",
                        path.display()
                    ))
                })?;
                if positional.insert(dim, col).is_some() {
                    return Err(QaError::Data(format!(
                        "dimension {dim} appears twice in {}",
                        path.display()
                    )));
                }
            }
        }
    }
    let title_col = title_col
        .ok_or_else(|| QaError::Data(format!("{} has no title column", path.display())))?;
    let heading_col = heading_col
        .ok_or_else(|| QaError::Data(format!("{} has no heading column", path.display())))?;

    let dims = positional.keys().next_back().map_or(0, |max| max + 1);
    let mut columns = Vec::with_capacity(dims);
    for dim in 0..dims {
        let col = positional.get(&dim).copied().ok_or_else(|| {
            QaError::Data(format!("{} is missing dimension column {dim}", path.display()))
        })?;
        columns.push(col);
    }

    let mut embeddings = BTreeMap::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let line = idx + 2;
        if columns.is_empty() {
            return Err(QaError::Data(format!(
                "{} has rows but no dimension columns",
                path.display()
            )));
        }
        let field = |col: usize| record.get(col).unwrap_or_default();
        let key = SectionKey::new(field(title_col), field(heading_col));
        let mut vector = Vec::with_capacity(dims);
        for (dim, &col) in columns.iter().enumerate() {
            let raw = field(col);
            let value = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| {
                    QaError::Data(format!(
                        "line {line} of {}: dimension {dim} holds '{raw}', not a finite number",
                        path.display()
                    ))
                })?;
            vector.push(value);
        }
        if embeddings.insert(key.clone(), vector).is_some() {
            tracing::warn!(%key, line, "duplicate embedding row; keeping the later one");
        }
    }
    Ok(embeddings)
}

/// Writes an embedding table with one positional column per dimension.
///
/// All vectors must share one dimensionality.
pub fn write_embeddings<'a, I>(path: &Path, embeddings: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a SectionKey, &'a Embedding)>,
{
    let rows: Vec<_> = embeddings.into_iter().collect();
    let dims = rows.first().map_or(0, |(_, vector)| vector.len());
    if let Some((key, vector)) = rows.iter().find(|(_, vector)| vector.len() != dims) {
        return Err(QaError::Data(format!(
            "embedding for {key} has {} dimensions, expected {dims}",
            vector.len()
        )));
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|err| QaError::Data(format!("failed to create {}: {err}", path.display())))?;
    let mut header = vec![TITLE_COLUMN.to_string(), HEADING_COLUMN.to_string()];
    header.extend((0..dims).map(|dim| dim.to_string()));
    writer.write_record(&header)?;
    for (key, vector) in rows {
        let mut record = Vec::with_capacity(dims + 2);
        record.push(key.title.clone());
        record.push(key.heading.clone());
        // `Display` for f64 emits the shortest string that parses back to the same value.
        record.extend(vector.iter().map(|value| value.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush().map_err(QaError::data)?;
    Ok(())
}

/// Read-only corpus loaded once per process and shared across queries.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    sections: BTreeMap<SectionKey, DocumentSection>,
    embeddings: BTreeMap<SectionKey, Embedding>,
    dimensions: Option<usize>,
}

impl Corpus {
    /// Loads and cross-checks both tables.
    pub fn load(sections_path: &Path, embeddings_path: &Path) -> Result<Self> {
        let sections = read_sections(sections_path)?;
        let embeddings = read_embeddings(embeddings_path)?;
        let corpus = Self::from_parts(sections, embeddings)?;
        tracing::info!(
            sections = corpus.sections.len(),
            embeddings = corpus.embeddings.len(),
            dimensions = corpus.dimensions.unwrap_or(0),
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// Builds a corpus from in-memory tables.
    ///
    /// Duplicate section keys keep the first row. Embeddings without a matching
    /// section are dropped since they could never be rendered into a prompt.
    pub fn from_parts(
        sections: Vec<DocumentSection>,
        embeddings: BTreeMap<SectionKey, Embedding>,
    ) -> Result<Self> {
        let mut by_key = BTreeMap::new();
        for section in sections {
            match by_key.entry(section.key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(section);
                }
                Entry::Occupied(_) => {
                    tracing::warn!(key = %section.key, "duplicate section; keeping the first row");
                }
            }
        }

        let mut dimensions = None;
        for (key, vector) in &embeddings {
            match dimensions {
                None => dimensions = Some(vector.len()),
                Some(dims) if dims != vector.len() => {
                    return Err(QaError::Data(format!(
                        "embedding for {key} has {} dimensions, corpus uses {dims}",
                        vector.len()
                    )));
                }
                Some(_) => {}
            }
        }

        let total = embeddings.len();
        let embeddings: BTreeMap<_, _> = embeddings
            .into_iter()
            .filter(|(key, _)| by_key.contains_key(key))
            .collect();
        let dropped = total - embeddings.len();
        if dropped > 0 {
            tracing::warn!(dropped, "ignoring embeddings with no matching section");
        }

        Ok(Self {
            sections: by_key,
            embeddings,
            dimensions,
        })
    }

    /// Sections keyed by `(title, heading)`.
    pub fn sections(&self) -> &BTreeMap<SectionKey, DocumentSection> {
        &self.sections
    }

    /// Document embeddings keyed by `(title, heading)`.
    pub fn embeddings(&self) -> &BTreeMap<SectionKey, Embedding> {
        &self.embeddings
    }

    /// Shared embedding dimensionality, if any embeddings were loaded.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Number of rankable sections.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Whether the corpus has nothing to rank.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}
