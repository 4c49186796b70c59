use crate::models::{CardId, Offset, Pointer};

/// An in-progress pointer drag of one card.
///
/// Moves only compute the visual offset; the card itself is updated once, on release.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub card_id: CardId,
    start: Pointer,
    origin: Offset,
    last: Pointer,
}

impl DragSession {
    pub fn begin(card_id: CardId, pointer: Pointer, origin: Offset) -> Self {
        Self {
            card_id,
            start: pointer,
            origin,
            last: pointer,
        }
    }

    pub fn move_to(&mut self, pointer: Pointer) -> Offset {
        self.last = pointer;
        self.offset_at(pointer)
    }

    /// Final offset for the release. A release without coordinates falls back to the
    /// last seen pointer position.
    pub fn finish(self, pointer: Option<Pointer>) -> (CardId, Offset) {
        let at = pointer.unwrap_or(self.last);
        let offset = self.offset_at(at);
        (self.card_id, offset)
    }

    fn offset_at(&self, pointer: Pointer) -> Offset {
        Offset {
            x: (f64::from(self.origin.x) + (pointer.x - self.start.x)).round() as i32,
            y: (f64::from(self.origin.y) + (pointer.y - self.start.y)).round() as i32,
        }
    }
}
