//! Word-level results with geometry and confidence

use crate::engine::{IteratorLevel, ResultCursor};
use crate::frame::Region;
use serde::Serialize;
use std::iter::FusedIterator;

/// One recognized segment at the requested iterator level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Word {
    pub text: String,
    /// 0 to 100
    pub confidence: f32,
    pub bounding_box: Region,
}

/// Walks a result cursor once, yielding owned `Word` records.
///
/// Stops at exhaustion, or at the first position the engine cannot read;
/// records already yielded stay valid.
pub struct WordWalker<C: ResultCursor> {
    cursor: C,
    level: IteratorLevel,
    started: bool,
    done: bool,
}

impl<C: ResultCursor> WordWalker<C> {
    pub fn new(cursor: C, level: IteratorLevel) -> Self {
        Self {
            cursor,
            level,
            started: false,
            done: false,
        }
    }

    fn read_current(&self) -> Option<Word> {
        let text = self.cursor.text(self.level)?;
        let confidence = self.cursor.confidence(self.level).clamp(0.0, 100.0);
        let bounding_box = self
            .cursor
            .bounding_box(self.level)
            .map(Region::from)
            .unwrap_or_default();

        Some(Word {
            text,
            confidence,
            bounding_box,
        })
    }
}

impl<C: ResultCursor> Iterator for WordWalker<C> {
    type Item = Word;

    fn next(&mut self) -> Option<Word> {
        if self.done {
            return None;
        }

        if !self.started {
            self.cursor.begin();
            self.started = true;
        } else if !self.cursor.next(self.level) {
            self.done = true;
            return None;
        }

        match self.read_current() {
            Some(word) => Some(word),
            None => {
                tracing::debug!("Result iterator returned no text at {:?} level", self.level);
                self.done = true;
                None
            }
        }
    }
}

impl<C: ResultCursor> FusedIterator for WordWalker<C> {}
