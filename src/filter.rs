use crate::record::EventRecord;

/// Records at most `max_age_years` old, in their original order.
pub fn filter_by_age(records: &[EventRecord], max_age_years: i32) -> Vec<&EventRecord> {
    records
        .iter()
        .filter(|r| r.age_years <= max_age_years)
        .collect()
}
