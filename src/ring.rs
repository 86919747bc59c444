/*!
    cursor arithmetic over the device circular pool

    Both the device (producing) and the host (consuming) keep a [Cursor] into the same pool. A cursor is a position in the pool plus the number of times it wrapped around, so comparing two cursors tells whether there is data between them even when the positions alone are ambiguous.
*/

use core::cmp::Ordering;
use crate::protocol::CacheState;


/// half the range of the wrap counter, difference at which ordering becomes ambiguous
const HALF_WRAPS: u8 = 128;

/// position in a circular pool, with the number of wraps it took to get there
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Cursor {
    /// index in the pool
    pub position: u16,
    /// number of times the position went back to zero, wrapping on overflow
    pub wraps: u8,
}
impl Cursor {
    pub const fn new(position: u16, wraps: u8) -> Self {
        Self {position, wraps}
    }
    /**
        total order between cursors

        equal wraps compare by position, otherwise the cursor with most wraps is ahead.
        Wraps are compared by their wrapping difference so the order survives overflow of the counter, a difference of exactly half the counter range falls back to the raw values.
    */
    pub fn compare(&self, other: &Self) -> Ordering {
        match self.wraps.wrapping_sub(other.wraps) {
            0 => self.position.cmp(&other.position),
            HALF_WRAPS => self.wraps.cmp(&other.wraps),
            delta if delta < HALF_WRAPS => Ordering::Greater,
            _ => Ordering::Less,
        }
    }
    /// true if `other` is strictly ahead of this cursor
    pub fn is_behind(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Less
    }
    /// true if this cursor is strictly ahead of `other`
    pub fn is_ahead(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Greater
    }
    /// move one position forward in a pool of `pool` bytes, counting a wrap when going back to zero
    pub fn advance(&mut self, pool: usize) {
        // pools are at most 256 bytes so the position fits back
        self.position = ((usize::from(self.position) + 1) % pool) as u16;
        if self.position == 0 {
            self.wraps = self.wraps.wrapping_add(1);
        }
    }
}
impl From<CacheState> for Cursor {
    fn from(state: CacheState) -> Self {
        Self::new(state.position().into(), state.wraps())
    }
}
impl TryFrom<Cursor> for CacheState {
    type Error = &'static str;
    fn try_from(cursor: Cursor) -> Result<Self, Self::Error> {
        let position = u8::try_from(cursor.position)
            .map_err(|_| "cursor position does not fit in cache state")?;
        Ok(CacheState::new(cursor.wraps, position))
    }
}


/**
    move the `local` cursor past data the device overwrote before it could be read

    `remote` is the device cursor observed along with `mirror`, the current pool content.
    When the device did a full turn of the pool or more since `local`, the bytes under `local` are no longer the ones it was pointing to. The cursor then restarts from the oldest byte in the pool and skips to the first line start, so that reading resumes on a line boundary.

    A device exactly one wrap ahead but at a lower position than `local` is not considered lapped, even though it may have overwritten the region before `local` wrapped itself.
*/
pub fn reconcile(local: Cursor, remote: Cursor, mirror: &[u8]) -> Cursor {
    let pool = mirror.len();
    if pool == 0 || usize::from(remote.position) >= pool
        {return local}

    let delta = remote.wraps.wrapping_sub(local.wraps);
    let lapped = delta > 1 || (delta == 1 && remote.position >= local.position);
    if !lapped
        {return local}

    // oldest byte still in the pool, no wrap counted here
    let mut cursor = Cursor::new(
        ((usize::from(remote.position) + 1) % pool) as u16,
        remote.wraps.wrapping_sub(1),
        );
    while mirror[usize::from(cursor.position)] != b'\n' && cursor.position != remote.position {
        cursor.advance(pool);
    }
    // first byte after the line feed
    cursor.advance(pool);
    cursor
}
