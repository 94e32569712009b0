pub mod app_config;
pub mod config;
pub mod date;
pub mod error;
pub mod facilities;
pub mod holiday;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use date::{normalize_date, parse_target_date, weekday_ja};
pub use error::ConfigError;
pub use facilities::{
    ClosedWeekday, ExtractorKind, FacilityRule, FacilityTable, LongClosure, OverrideEntry,
    SeasonalWindow,
};
pub use holiday::{HolidayCalendar, NoHolidays, StaticHolidayCalendar};
