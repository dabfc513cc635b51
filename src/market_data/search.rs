// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Full-text index over the identifier map, backed by an in-memory tantivy
//! index.
//!
//! Documents carry the entry id plus three text fields. `symbol` is only
//! lowercased and split; `name` and `slug` also go through the English
//! stemmer, so `tethers` finds `tether` and `usd-coin` yields `usd` and
//! `coin`.
//!
//! ## Query syntax
//!
//! Whitespace separates terms, and terms are OR-ed unless marked:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `eth` | stemmed token, also as a prefix; 5+ chars tolerate one edit |
//! | `symbol:eth` | restrict the term to one of `symbol`, `slug`, `name` |
//! | `teth*` | prefix match only |
//! | `etherium~2` | edit-distance match (at most 2) |
//! | `+eth` / `-classic` | term is required / excluded |
//!
//! Hits are ordered by score, then by position in the map.

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED,
};
use tantivy::tokenizer::{TextAnalyzer, TokenStream};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use super::types::IdentifierEntry;

/// Writer arena; tantivy's per-thread minimum.
const WRITER_MEMORY_BYTES: usize = 15_000_000;

const SYMBOL_BOOST: f32 = 2.0;
const PREFIX_WEIGHT: f32 = 0.5;
const AUTO_FUZZY_WEIGHT: f32 = 0.25;
const AUTO_FUZZY_MIN_CHARS: usize = 5;
const MAX_EDIT_DISTANCE: u8 = 2;

/// A ranked search result referencing an identifier-map entry id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub reference: u64,
    pub score: f64,
}

#[derive(Clone, Copy)]
struct Fields {
    id: Field,
    symbol: Field,
    slug: Field,
    name: Field,
}

impl Fields {
    fn named(&self, name: &str) -> Option<Field> {
        match name.to_ascii_lowercase().as_str() {
            "symbol" => Some(self.symbol),
            "slug" => Some(self.slug),
            "name" => Some(self.name),
            _ => None,
        }
    }

    fn text(&self) -> [Field; 3] {
        [self.symbol, self.slug, self.name]
    }

    fn boost(&self, field: Field) -> f32 {
        if field == self.symbol {
            SYMBOL_BOOST
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Matching {
    Token,
    Prefix,
    Fuzzy(u8),
}

/// One whitespace-separated query term after its markers are stripped.
#[derive(Debug, PartialEq)]
struct QueryTerm<'a> {
    occur: Occur,
    field: Option<&'a str>,
    text: &'a str,
    matching: Matching,
}

fn parse_term(raw: &str) -> QueryTerm<'_> {
    let (occur, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (Occur::Must, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (Occur::MustNot, rest)
    } else {
        (Occur::Should, raw)
    };

    let (field, rest) = match rest.split_once(':') {
        Some((field, text)) if !field.is_empty() => (Some(field), text),
        _ => (None, rest),
    };

    let (text, matching) = if let Some((text, distance)) = rest.rsplit_once('~') {
        match distance.parse::<u8>() {
            Ok(distance) => (text, Matching::Fuzzy(distance.min(MAX_EDIT_DISTANCE))),
            Err(_) => (rest, Matching::Token),
        }
    } else if let Some(text) = rest.strip_suffix('*') {
        (text, Matching::Prefix)
    } else {
        (rest, Matching::Token)
    };

    QueryTerm {
        occur,
        field,
        text,
        matching,
    }
}

fn analyze(analyzer: &TextAnalyzer, text: &str) -> Vec<String> {
    let mut analyzer = analyzer.clone();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    tokens
}

fn boosted(query: impl Query + 'static, boost: f32) -> Box<dyn Query> {
    Box::new(BoostQuery::new(Box::new(query), boost))
}

/// Immutable index built from one identifier-map snapshot.
pub struct SearchIndex {
    fields: Fields,
    reader: IndexReader,
    plain: TextAnalyzer,
    stemmed: TextAnalyzer,
    len: usize,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").field("len", &self.len).finish()
    }
}

impl SearchIndex {
    pub fn build(entries: &[IdentifierEntry]) -> tantivy::Result<Self> {
        let stemmed_text = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("en_stem")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );
        let plain_text = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("default")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );

        let mut builder = Schema::builder();
        let fields = Fields {
            id: builder.add_u64_field("id", STORED),
            symbol: builder.add_text_field("symbol", plain_text),
            slug: builder.add_text_field("slug", stemmed_text.clone()),
            name: builder.add_text_field("name", stemmed_text),
        };
        let index = Index::create_in_ram(builder.build());

        // One worker thread keeps document order equal to map order.
        let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        for entry in entries {
            writer.add_document(doc!(
                fields.id => entry.id,
                fields.symbol => entry.symbol.as_str(),
                fields.slug => entry.slug.as_str(),
                fields.name => entry.name.as_str(),
            ))?;
        }
        writer.commit()?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            fields,
            reader,
            plain: index.tokenizer_for_field(fields.symbol)?,
            stemmed: index.tokenizer_for_field(fields.name)?,
            len: entries.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn analyzer(&self, field: Field) -> &TextAnalyzer {
        if field == self.fields.symbol {
            &self.plain
        } else {
            &self.stemmed
        }
    }

    fn term_query(&self, term: &QueryTerm<'_>) -> Option<Box<dyn Query>> {
        let fields: Vec<Field> = match term.field.and_then(|name| self.fields.named(name)) {
            Some(field) => vec![field],
            None => self.fields.text().to_vec(),
        };

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for field in fields {
            let boost = self.fields.boost(field);
            match term.matching {
                Matching::Token => {
                    for token in analyze(self.analyzer(field), term.text) {
                        let indexed = Term::from_field_text(field, &token);
                        clauses.push((
                            Occur::Should,
                            boosted(
                                TermQuery::new(indexed.clone(), IndexRecordOption::WithFreqs),
                                boost,
                            ),
                        ));
                        clauses.push((
                            Occur::Should,
                            boosted(
                                FuzzyTermQuery::new_prefix(indexed.clone(), 0, true),
                                boost * PREFIX_WEIGHT,
                            ),
                        ));
                        if token.chars().count() >= AUTO_FUZZY_MIN_CHARS {
                            clauses.push((
                                Occur::Should,
                                boosted(
                                    FuzzyTermQuery::new(indexed, 1, true),
                                    boost * AUTO_FUZZY_WEIGHT,
                                ),
                            ));
                        }
                    }
                }
                Matching::Prefix => {
                    for token in analyze(&self.plain, term.text) {
                        let indexed = Term::from_field_text(field, &token);
                        clauses.push((
                            Occur::Should,
                            boosted(FuzzyTermQuery::new_prefix(indexed, 0, true), boost),
                        ));
                    }
                }
                Matching::Fuzzy(distance) => {
                    for token in analyze(&self.plain, term.text) {
                        let indexed = Term::from_field_text(field, &token);
                        clauses.push((
                            Occur::Should,
                            boosted(FuzzyTermQuery::new(indexed, distance, true), boost),
                        ));
                    }
                }
            }
        }

        (!clauses.is_empty()).then(|| Box::new(BooleanQuery::new(clauses)) as Box<dyn Query>)
    }

    /// Run a query and return hits in relevance order.
    pub fn search(&self, query: &str) -> tantivy::Result<Vec<SearchHit>> {
        let searcher = self.reader.searcher();
        let limit = searcher.num_docs() as usize;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn Query>)> = query
            .split_whitespace()
            .map(parse_term)
            .filter_map(|term| Some((term.occur, self.term_query(&term)?)))
            .collect();
        if clauses.iter().all(|(occur, _)| *occur == Occur::MustNot) {
            return Ok(Vec::new());
        }

        let mut top = searcher.search(&BooleanQuery::new(clauses), &TopDocs::with_limit(limit))?;
        top.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut hits = Vec::with_capacity(top.len());
        for (score, address) in top {
            let document: TantivyDocument = searcher.doc(address)?;
            if let Some(reference) = document.get_first(self.fields.id).and_then(|v| v.as_u64()) {
                hits.push(SearchHit {
                    reference,
                    score: f64::from(score),
                });
            }
        }
        Ok(hits)
    }
}
