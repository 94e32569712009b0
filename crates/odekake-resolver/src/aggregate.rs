use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::resolver::Resolver;
use crate::verdict::ClosureVerdict;

/// One date resolved across the whole facility set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub date: String,
    pub total: usize,
    pub closed_count: usize,
    pub open_count: usize,
    pub closed_list: Vec<String>,
    pub open_list: Vec<String>,
    pub facilities: Vec<ClosureVerdict>,
}

impl Resolver {
    /// Resolves every facility for one date. A single facility's failure
    /// never aborts the batch; its verdict carries its own error field.
    pub async fn resolve_all(&self, date: NaiveDate) -> Summary {
        let rules: Vec<_> = self.table().all().to_vec();
        let mut verdicts = Vec::with_capacity(rules.len());
        for rule in &rules {
            verdicts.push(self.resolve(rule, date).await);
        }

        let closed_list: Vec<String> = verdicts
            .iter()
            .filter(|v| v.is_closed == Some(true))
            .map(|v| v.facility.clone())
            .collect();
        let open_list: Vec<String> = verdicts
            .iter()
            .filter(|v| v.is_closed == Some(false))
            .map(|v| v.facility.clone())
            .collect();

        Summary {
            date: date.format("%Y-%m-%d").to_string(),
            total: verdicts.len(),
            closed_count: closed_list.len(),
            open_count: open_list.len(),
            closed_list,
            open_list,
            facilities: verdicts,
        }
    }
}
