use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED};
use tantivy::tokenizer::{TextAnalyzer, Token, TokenStream, Tokenizer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "credit_text";
pub const ORDINAL_FIELD: &str = "ordinal";
pub const TEXT_FIELD: &str = "text";

/// Short tokens that still carry meaning: credit categories and rating
/// system abbreviations.
const SHORT_CODES: &[&str] = &[
    "EA", "WE", "MR", "EQ", "SS", "LT", "IN", "RP", "IP", "NC", "CS", "BD", "ID", "OM", "ND",
];

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    let _ordinal_field = schema_builder.add_u64_field(ORDINAL_FIELD, STORED);
    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
    let _text_field = schema_builder.add_text_field(TEXT_FIELD, text_options);
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    let analyzer = TextAnalyzer::builder(CreditTokenizer).build();
    index.tokenizers().register(TOKENIZER_NAME, analyzer);
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn keep_token(token: &str) -> bool {
    token.chars().count() >= 2
        || SHORT_CODES
            .iter()
            .any(|code| code.eq_ignore_ascii_case(token))
}

/// Lower-cased runs of word characters and hyphens, so `WE-c1` stays one
/// term. Single-character tokens are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    token_spans(text).into_iter().map(|(_, _, t)| t).collect()
}

fn token_spans(text: &str) -> Vec<(usize, usize, String)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
        match (start, is_token_char(c) && i < text.len()) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                let token = text[s..i].to_lowercase();
                if keep_token(&token) {
                    spans.push((s, i, token));
                }
                start = None;
            }
            _ => {}
        }
    }
    spans
}

/// Tantivy tokenizer over [`tokenize`]'s rules.
#[derive(Clone, Default)]
pub struct CreditTokenizer;

pub struct CreditTokenStream {
    tokens: Vec<Token>,
    /// Number of tokens handed out so far.
    cursor: usize,
}

impl Tokenizer for CreditTokenizer {
    type TokenStream<'a> = CreditTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        let tokens = token_spans(text)
            .into_iter()
            .enumerate()
            .map(|(position, (offset_from, offset_to, text))| Token {
                offset_from,
                offset_to,
                position,
                text,
                position_length: 1,
            })
            .collect();
        CreditTokenStream { tokens, cursor: 0 }
    }
}

impl TokenStream for CreditTokenStream {
    fn advance(&mut self) -> bool {
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.cursor.saturating_sub(1)]
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.tokens[self.cursor.saturating_sub(1)]
    }
}
