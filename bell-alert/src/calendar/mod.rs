//! Holiday calendars and the trading-day gate.

pub mod bot;
pub mod gate;
pub mod nager;
pub mod source;

pub use bot::BotHolidaySource;
pub use gate::{is_weekend, local_date, HolidayFailurePolicy, TradingDayGate};
pub use nager::NagerHolidaySource;
pub use source::{
    collect_holidays, normalize_holiday_date, HolidayCalendarSource, HolidaySet, SharedHolidaySource,
};
