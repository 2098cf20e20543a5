// SPDX-License-Identifier: GPL-3.0-only

//! Cross-domain timestamp translation
//!
//! The capture session and the audio subsystem run on independent clocks.
//! To interleave their samples on one monotonic timeline, audio timestamps
//! are translated into the session clock domain before being appended to the
//! container writer.

use crate::platform::types::{MediaClock, Timestamp};

/// Translate a timestamp from one clock domain into another
///
/// Both clocks are described by their offset from host time, so the
/// translation is a pure offset shift: a timestamp `t` on clock `from`
/// refers to the same instant as `t + from.offset - to.offset` on clock
/// `to`.
pub fn convert(timestamp: Timestamp, from: MediaClock, to: MediaClock) -> Timestamp {
    if from == to {
        return timestamp;
    }
    timestamp.offset_by(from.offset_from_host_ns - to.offset_from_host_ns)
}
