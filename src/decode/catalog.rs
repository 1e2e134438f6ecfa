use crate::decode::scanner::JsonScanner;
use crate::error::{BakeError, Result};
use crate::types::{RawCard, RawCatalogEntry, RawSetBody, SetContext, TaggedCard};
use std::io::BufRead;
use std::rc::Rc;
use tracing::trace;

/// Key of the root member holding the sets
const DATA_KEY: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Root { first: bool },
    Data { first: bool },
    Done,
}

/// Lazy, single-pass decoder yielding one catalog entry per `data` member.
///
/// Only one set body is held in memory at a time. Root members other than
/// `data` are skipped without being decoded, but they must still be valid
/// JSON. A second `data` member is rejected.
pub struct CatalogDecoder<R> {
    scanner: JsonScanner<R>,
    state: State,
    saw_data: bool,
    window: Vec<u8>,
}

impl<R: BufRead> CatalogDecoder<R> {
    pub fn new(reader: R) -> Self {
        CatalogDecoder {
            scanner: JsonScanner::new(reader),
            state: State::Start,
            saw_data: false,
            window: Vec::new(),
        }
    }

    fn advance(&mut self) -> Result<Option<RawCatalogEntry>> {
        loop {
            match self.state {
                State::Start => {
                    self.scanner.expect(b'{')?;
                    self.state = State::Root { first: true };
                }
                State::Root { first } => {
                    if self.scanner.peek_token()? == Some(b'}') {
                        self.scanner.expect(b'}')?;
                        self.scanner.expect_end()?;
                        self.state = State::Done;
                        if !self.saw_data {
                            return Err(BakeError::malformed(
                                self.scanner.offset(),
                                "document has no `data` member",
                            ));
                        }
                        return Ok(None);
                    }
                    if !first {
                        self.scanner.expect(b',')?;
                    }

                    self.scanner.peek_token()?;
                    let key_offset = self.scanner.offset();
                    let key = self.scanner.read_key()?;
                    if key == DATA_KEY {
                        if self.saw_data {
                            return Err(BakeError::malformed(key_offset, "duplicate `data` member"));
                        }
                        if self.scanner.peek_token()? != Some(b'{') {
                            return Err(BakeError::malformed(
                                self.scanner.offset(),
                                "`data` member is not an object",
                            ));
                        }
                        self.scanner.expect(b'{')?;
                        self.saw_data = true;
                        self.state = State::Data { first: true };
                    } else {
                        trace!("Skipping root member {:?}", key);
                        self.scanner.skip_value()?;
                        self.state = State::Root { first: false };
                    }
                }
                State::Data { first } => {
                    if self.scanner.peek_token()? == Some(b'}') {
                        self.scanner.expect(b'}')?;
                        self.state = State::Root { first: false };
                        continue;
                    }
                    if !first {
                        self.scanner.expect(b',')?;
                    }

                    let key = self.scanner.read_key()?;
                    self.scanner.peek_token()?;
                    let start = self.scanner.offset();

                    self.window.clear();
                    self.scanner.capture_value(&mut self.window)?;
                    let body: RawSetBody = serde_json::from_slice(&self.window)
                        .map_err(|e| BakeError::malformed(start, format!("set {key:?}: {e}")))?;

                    self.state = State::Data { first: false };
                    return Ok(Some(body.into_entry(key)));
                }
                State::Done => return Ok(None),
            }
        }
    }
}

impl<R: BufRead> Iterator for CatalogDecoder<R> {
    type Item = Result<RawCatalogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Done {
            return None;
        }
        match self.advance() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

/// Entry-centric view: every card of every entry, in order
pub struct CardStream<I> {
    entries: I,
    current: Option<(Rc<SetContext>, std::vec::IntoIter<RawCard>)>,
    failed: bool,
}

impl<I> CardStream<I>
where
    I: Iterator<Item = Result<RawCatalogEntry>>,
{
    pub fn new(entries: I) -> Self {
        CardStream {
            entries,
            current: None,
            failed: false,
        }
    }
}

impl<I> Iterator for CardStream<I>
where
    I: Iterator<Item = Result<RawCatalogEntry>>,
{
    type Item = Result<TaggedCard>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some((set, cards)) = &mut self.current {
                if let Some(card) = cards.next() {
                    return Some(Ok(TaggedCard {
                        set: Rc::clone(set),
                        card,
                    }));
                }
            }

            match self.entries.next()? {
                Ok(entry) => {
                    self.current = Some((Rc::new(entry.set), entry.cards.into_iter()));
                }
                Err(e) => {
                    self.failed = true;
                    self.current = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> Vec<Result<RawCatalogEntry>> {
        CatalogDecoder::new(input.as_bytes()).collect()
    }

    #[test]
    fn test_decodes_sets_in_order_and_skips_meta() {
        let input = r#"{
            "meta": {"date": "2024-01-01", "version": "5.2.2"},
            "data": {
                "ZZZ": {"code": "ZZZ", "name": "Last Alphabetically", "cards": [{"uuid": "z1"}]},
                "AAA": {"booster": {"x": [1, {"y": "}"}]}, "cards": [{"uuid": "a1"}, {"uuid": "a2"}],
                        "code": "AAA", "isOnlineOnly": true, "name": "First"}
            }
        }"#;

        let entries: Vec<RawCatalogEntry> = decode(input).into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].set.code, "ZZZ");
        assert_eq!(entries[0].cards.len(), 1);
        assert_eq!(entries[1].set.code, "AAA");
        assert_eq!(entries[1].set.name.as_deref(), Some("First"));
        assert!(entries[1].set.online_only);
        assert_eq!(entries[1].cards.len(), 2);
    }

    #[test]
    fn test_members_after_data_are_skipped() {
        let input = r#"{"data": {"S": {"cards": []}}, "meta": {"v": 1}}"#;
        let entries = decode(input);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_ref().unwrap().set.code, "S");
    }

    #[test]
    fn test_empty_data() {
        assert!(decode(r#"{"data": {}}"#).is_empty());
    }

    #[test]
    fn test_missing_data_is_malformed() {
        let entries = decode(r#"{"meta": {}}"#);
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], Err(BakeError::MalformedJson { .. })));
    }

    #[test]
    fn test_data_not_object() {
        let entries = decode(r#"{"data": []}"#);
        assert!(matches!(entries[0], Err(BakeError::MalformedJson { .. })));
    }

    #[test]
    fn test_truncated_document_yields_entries_then_error() {
        let input = r#"{"data": {"A": {"cards": [{"uuid": "a1"}]}, "B": {"cards": [{"uu"#;
        let entries = decode(input);

        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_ok());
        assert!(matches!(entries[1], Err(BakeError::MalformedJson { .. })));
    }

    #[test]
    fn test_invalid_set_body_reports_offset() {
        let input = r#"{"data": {"A": 5}}"#;
        let entries = decode(input);

        match &entries[0] {
            Err(BakeError::MalformedJson { offset, message }) => {
                assert_eq!(*offset, Some(15));
                assert!(message.contains("\"A\""));
            }
            other => panic!("Expected MalformedJson, got {:?}", other),
        }
    }

    #[test]
    fn test_fused_after_error() {
        let mut decoder = CatalogDecoder::new(&b"{\"data\": {\"A\" 1}}"[..]);
        assert!(decoder.next().unwrap().is_err());
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_card_stream_tags_cards() {
        let input = r#"{"data": {
            "A": {"name": "Alpha", "cards": [{"uuid": "a1"}, {"uuid": "a2"}]},
            "B": {"cards": []},
            "C": {"cards": [{"uuid": "c1"}]}
        }}"#;

        let cards: Vec<TaggedCard> = CardStream::new(CatalogDecoder::new(input.as_bytes()))
            .map(|r| r.unwrap())
            .collect();

        let ids: Vec<(&str, &str)> = cards
            .iter()
            .map(|c| (c.set.code.as_str(), c.card.0["uuid"].as_str().unwrap()))
            .collect();
        assert_eq!(ids, vec![("A", "a1"), ("A", "a2"), ("C", "c1")]);
        assert!(Rc::ptr_eq(&cards[0].set, &cards[1].set));
    }

    #[test]
    fn test_duplicate_data_is_malformed() {
        let entries = decode(r#"{"data": {"A": {"cards": []}}, "data": {}}"#);

        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_ok());
        match &entries[1] {
            Err(BakeError::MalformedJson { offset, message }) => {
                assert_eq!(*offset, Some(31));
                assert!(message.contains("duplicate"));
            }
            other => panic!("Expected MalformedJson, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_skipped_member_is_malformed() {
        let entries = decode(r#"{"meta": {"v" 1}, "data": {"A": {"cards": []}}}"#);

        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], Err(BakeError::MalformedJson { .. })));
    }

    #[test]
    fn test_wrong_typed_set_fields_are_absent() {
        let input = r#"{"data": {"S": {"code": 7, "name": 5, "isOnlineOnly": 0, "cards": ["junk", {"uuid": "s1"}]}}}"#;
        let entries = decode(input);

        let entry = entries[0].as_ref().unwrap();
        assert_eq!(entry.set.code, "S");
        assert_eq!(entry.set.name, None);
        assert!(!entry.set.online_only);
        assert_eq!(entry.cards.len(), 2);
        assert!(entry.cards[0].0.is_empty());
    }
}
