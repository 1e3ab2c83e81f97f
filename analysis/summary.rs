use crate::data::{Dataset, Record, Sex};
use serde::Serialize;

/// Descriptive statistics for one outcome group. Empty groups report NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: &'static str,
    pub count: usize,
    pub percent_of_total: f64,
    pub mean_age: f64,
    pub sd_age: f64,
    pub mean_bmi: f64,
    pub sd_bmi: f64,
    pub mean_systolic_bp: f64,
    pub sd_systolic_bp: f64,
    pub percent_male: f64,
    pub percent_active: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveSummary {
    pub total: usize,
    pub prevalence: f64,
    /// Respondents without the condition first, then with.
    pub groups: [GroupSummary; 2],
}

pub fn summarize(dataset: &Dataset) -> DescriptiveSummary {
    let (with, without): (Vec<&Record>, Vec<&Record>) =
        dataset.records().iter().partition(|r| r.has_condition);
    let total = dataset.len();
    DescriptiveSummary {
        total,
        prevalence: dataset.prevalence(),
        groups: [
            group_summary("without_condition", &without, total),
            group_summary("with_condition", &with, total),
        ],
    }
}

fn group_summary(group: &'static str, records: &[&Record], total: usize) -> GroupSummary {
    let (mean_age, sd_age) = mean_sd(records.iter().map(|r| r.age));
    let (mean_bmi, sd_bmi) = mean_sd(records.iter().map(|r| r.bmi));
    let (mean_systolic_bp, sd_systolic_bp) = mean_sd(records.iter().map(|r| r.systolic_bp));
    GroupSummary {
        group,
        count: records.len(),
        percent_of_total: percent(records.len(), total),
        mean_age,
        sd_age,
        mean_bmi,
        sd_bmi,
        mean_systolic_bp,
        sd_systolic_bp,
        percent_male: percent(records.iter().filter(|r| r.sex == Sex::Male).count(), records.len()),
        percent_active: percent(
            records.iter().filter(|r| r.physically_active).count(),
            records.len(),
        ),
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        f64::NAN
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Mean and sample standard deviation (n - 1). A single value has NaN spread.
fn mean_sd(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    if n == 1 {
        return (mean, f64::NAN);
    }
    let ss: f64 = values.map(|v| (v - mean).powi(2)).sum();
    (mean, (ss / (n - 1) as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn record(has_condition: bool, age: f64, male: bool, active: bool) -> Record {
        Record {
            has_condition,
            age,
            sex: if male { Sex::Male } else { Sex::Female },
            bmi: age / 2.0,
            systolic_bp: 100.0 + age,
            physically_active: active,
        }
    }

    #[test]
    fn groups_are_split_by_outcome() {
        let data = Dataset::new(vec![
            record(true, 60.0, true, false),
            record(true, 70.0, false, false),
            record(false, 30.0, true, true),
            record(false, 40.0, true, false),
            record(false, 50.0, false, true),
        ]);
        let summary = summarize(&data);
        assert_eq!(summary.total, 5);
        assert_abs_diff_eq!(summary.prevalence, 0.4);

        let [without, with] = &summary.groups;
        assert_eq!((without.group, without.count), ("without_condition", 3));
        assert_eq!((with.group, with.count), ("with_condition", 2));
        assert_abs_diff_eq!(without.percent_of_total, 60.0);
        assert_abs_diff_eq!(without.mean_age, 40.0);
        assert_abs_diff_eq!(without.sd_age, 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(without.mean_bmi, 20.0);
        assert_abs_diff_eq!(without.mean_systolic_bp, 140.0);
        assert_abs_diff_eq!(without.percent_male, 200.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(without.percent_active, 200.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(with.mean_age, 65.0);
        assert_abs_diff_eq!(with.sd_age, 50.0f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(with.percent_male, 50.0);
        assert_abs_diff_eq!(with.percent_active, 0.0);
    }

    #[test]
    fn empty_group_reports_nan() {
        let data = Dataset::new(vec![record(false, 30.0, true, true)]);
        let summary = summarize(&data);
        let with = &summary.groups[1];
        assert_eq!(with.count, 0);
        assert_abs_diff_eq!(with.percent_of_total, 0.0);
        assert!(with.mean_age.is_nan() && with.percent_male.is_nan());
        let without = &summary.groups[0];
        assert_abs_diff_eq!(without.mean_age, 30.0);
        assert!(without.sd_age.is_nan());
    }
}
