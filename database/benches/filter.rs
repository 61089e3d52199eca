use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use database::{
    database::table::filter::{filter, AgeQuery},
    model::person::Person,
};

fn people(count: u64) -> Vec<Person> {
    let first_birthday = NaiveDate::from_ymd_opt(1940, 1, 1).expect("valid date");

    (1..=count)
        .map(|id| {
            // Spreads birthdays over ~80 years so every age bound matches a slice of the rows
            let date_of_birth = first_birthday + Duration::days((id * 7 % 29_000) as i64);
            let first_name = if id % 3 == 0 { "Adam" } else { "Eve" };

            Person::new_test(id, first_name, Some(date_of_birth))
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let reference_date = NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date");
    let rows = people(10_000);

    c.bench_function("filter 10k by age", |b| {
        let query = AgeQuery {
            min_age: Some(20),
            max_age: Some(40),
            ..Default::default()
        };

        b.iter(|| filter(black_box(rows.clone()), &query, reference_date))
    });

    c.bench_function("filter 10k by name and age", |b| {
        let query = AgeQuery {
            first_name_substring: Some("Ad".to_string()),
            min_age: Some(24),
            max_age: Some(24),
            ..Default::default()
        };

        b.iter(|| filter(black_box(rows.clone()), &query, reference_date))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
