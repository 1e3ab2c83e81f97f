use cohortfit::data::{Dataset, Record, Sex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::path::Path;

/// True log-odds used to simulate the outcome.
pub fn true_log_odds(record: &Record) -> f64 {
    let male = if record.sex == Sex::Male { 1.0 } else { 0.0 };
    let active = if record.physically_active { 1.0 } else { 0.0 };
    -8.0 + 0.055 * record.age + 0.3 * male + 0.08 * record.bmi + 0.01 * record.systolic_bp
        - 0.4 * active
}

/// A cohort with realistic covariate ranges and an outcome drawn from a known
/// logistic model.
pub fn synthetic_cohort(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let bmi_noise = Normal::new(0.0, 4.5).unwrap();
    let bp_noise = Normal::new(0.0, 12.0).unwrap();

    let records = (0..n)
        .map(|_| {
            let age: f64 = rng.gen_range(18.0..85.0);
            let bmi = (27.0 + 0.03 * (age - 50.0) + bmi_noise.sample(&mut rng)).clamp(15.0, 60.0);
            let systolic_bp = (105.0 + 0.5 * age + bp_noise.sample(&mut rng)).clamp(80.0, 220.0);
            let mut record = Record {
                has_condition: false,
                age: age.round(),
                sex: if rng.gen_bool(0.48) { Sex::Male } else { Sex::Female },
                bmi: (bmi * 10.0).round() / 10.0,
                systolic_bp: systolic_bp.round(),
                physically_active: rng.gen_bool(0.45),
            };
            let p = 1.0 / (1.0 + (-true_log_odds(&record)).exp());
            record.has_condition = rng.gen_bool(p);
            record
        })
        .collect();
    Dataset::new(records)
}

/// Writes `dataset` as a coded survey extract (outcome and activity 1 = yes, 2 = no;
/// sex 1 = male, 2 = female). Every `refused_every`-th row gets a refused code (7) in
/// the activity column instead.
pub fn write_survey_csv(path: &Path, dataset: &Dataset, refused_every: usize) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer
        .write_record([
            "respondent_id",
            "has_condition",
            "age",
            "sex",
            "bmi",
            "systolic_bp",
            "physically_active",
            "state",
        ])
        .unwrap();
    for (i, r) in dataset.records().iter().enumerate() {
        let yes_no = |b: bool| if b { "1" } else { "2" };
        let activity = if refused_every > 0 && i % refused_every == 0 {
            "7"
        } else {
            yes_no(r.physically_active)
        };
        writer
            .write_record([
                (i + 1).to_string(),
                yes_no(r.has_condition).to_string(),
                r.age.to_string(),
                if r.sex == Sex::Male { "1" } else { "2" }.to_string(),
                r.bmi.to_string(),
                r.systolic_bp.to_string(),
                activity.to_string(),
                "WA".to_string(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
}
