use super::StreamId;
use crate::error::GoAwayStatus;

/// Tells the peer no new streams will be accepted and which streams
/// remain valid.
#[derive(Debug)]
pub struct GoAway {
    last_good_stream_id: StreamId,
    status: GoAwayStatus,
}

impl GoAway {
    pub fn new(last_good_stream_id: StreamId, status: GoAwayStatus) -> GoAway {
        GoAway {
            last_good_stream_id,
            status,
        }
    }

    pub fn last_good_stream_id(&self) -> StreamId {
        self.last_good_stream_id
    }

    pub fn status(&self) -> GoAwayStatus {
        self.status
    }

    pub fn load(last_good_stream_id: u32, status_code: u32) -> Option<GoAway> {
        GoAwayStatus::from_wire(status_code).map(|status| GoAway {
            last_good_stream_id: StreamId::from_wire(last_good_stream_id),
            status,
        })
    }
}
