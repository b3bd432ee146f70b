//! Outline parsing: the chapter → subchapters structure returned by the LLM.
//!
//! JSON objects are read key by key so that chapter order follows the text,
//! not the hashing or sorting order of a map type.

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

/// One outline entry: a chapter and its ordered subchapter names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineChapter {
    pub name: String,
    pub subchapters: Vec<String>,
}

/// Ordered chapter → subchapters mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outline {
    chapters: Vec<OutlineChapter>,
}

impl Outline {
    /// Build an outline from ordered pairs. Later duplicates replace the
    /// subchapters of the first occurrence and keep its position.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let mut outline = Outline::default();
        for (name, subchapters) in pairs {
            outline.insert(
                name.into(),
                subchapters.into_iter().map(Into::into).collect(),
            );
        }
        outline
    }

    fn insert(&mut self, name: String, subchapters: Vec<String>) {
        match self.chapters.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.subchapters = subchapters,
            None => self.chapters.push(OutlineChapter { name, subchapters }),
        }
    }

    pub fn chapters(&self) -> &[OutlineChapter] {
        &self.chapters
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn subchapter_count(&self) -> usize {
        self.chapters.iter().map(|c| c.subchapters.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

impl<'de> Deserialize<'de> for Outline {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OutlineVisitor;

        impl<'de> Visitor<'de> for OutlineVisitor {
            type Value = Outline;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping chapter names to arrays of subchapter names")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Outline, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut outline = Outline::default();
                while let Some((name, subchapters)) = map.next_entry::<String, Vec<String>>()? {
                    outline.insert(name, subchapters);
                }
                Ok(outline)
            }
        }

        deserializer.deserialize_map(OutlineVisitor)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("outline is not valid JSON: {0}")]
pub struct OutlineError(#[from] serde_json::Error);

/// Parse the raw outline text returned by the LLM.
pub fn parse_outline(raw: &str) -> Result<Outline, OutlineError> {
    Ok(serde_json::from_str(raw)?)
}
