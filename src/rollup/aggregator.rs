use crate::rollup::types::MonthlyRollup;
use crate::types::{Channel, ListingRecord, ListingStatus, MonthWindow};

/// Roll up the listings created within `window`.
///
/// Records are matched on the server-local calendar, the same one the upstream
/// query bounds use; records without a creation time are skipped. Never fails: malformed fields were already
/// normalized to zero/false at deserialization.
pub fn aggregate(records: &[ListingRecord], window: MonthWindow) -> MonthlyRollup {
    let in_window = records.iter().filter(|rec| {
        rec.created_at
            .as_ref()
            .is_some_and(|created| window.contains(created))
    });
    summarize(in_window, window.label())
}

/// Roll up `records` as-is, without any time filter.
pub fn summarize<'a, I>(records: I, label: String) -> MonthlyRollup
where
    I: IntoIterator<Item = &'a ListingRecord>,
{
    let mut rollup = MonthlyRollup {
        month: label,
        ..MonthlyRollup::default()
    };

    for rec in records {
        rollup.total_ads += 1;
        match rec.status {
            ListingStatus::Live => rollup.live_ads += 1,
            ListingStatus::Draft => rollup.draft_ads += 1,
            ListingStatus::Published => {
                rollup.published_ads += 1;
                rollup.total_worth_of_ads += rec.price.unwrap_or(0.0);
                for channel in Channel::ALL {
                    if rec.channel_enabled(channel) {
                        *rollup.channel_count_mut(channel) += 1;
                    }
                }
            }
            ListingStatus::Other(_) => {}
        }
    }

    rollup
}
