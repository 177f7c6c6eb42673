use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Wall-clock source. Reminder and due-date logic only ever sees local
/// calendar time through this trait so tests can pin "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> PrimitiveDateTime;

    fn today(&self) -> Date {
        self.now().date()
    }

    /// Instant used for export timestamps.
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        // The local offset is unavailable on some multi-threaded unix setups.
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        PrimitiveDateTime::new(now.date(), now.time())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub PrimitiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> PrimitiveDateTime {
        self.0
    }

    fn now_utc(&self) -> OffsetDateTime {
        self.0.assume_utc()
    }
}
