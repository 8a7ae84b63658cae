// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Dataset loading and preprocessing for fake news classification
//!
//! Articles come from two CSV files (one of fake, one of true news) with the
//! columns `title`, `text`, `subject` and `date`.

use crate::preprocess::TextCleaner;
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Columns every article CSV must provide
pub const REQUIRED_COLUMNS: [&str; 4] = ["title", "text", "subject", "date"];

/// Binary label for an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    /// Fabricated or misleading article
    Fake,
    /// Genuine news article
    Real,
}

impl Label {
    /// Numeric form used for training (fake = 1, true = 0)
    pub fn to_binary(self) -> u8 {
        match self {
            Label::Fake => 1,
            Label::Real => 0,
        }
    }

    pub fn from_binary(value: u8) -> Self {
        if value == 1 {
            Label::Fake
        } else {
            Label::Real
        }
    }

    /// Label for a probability of being fake
    pub fn from_probability(p_fake: f64) -> Self {
        if p_fake >= 0.5 {
            Label::Fake
        } else {
            Label::Real
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Fake => "fake",
            Label::Real => "true",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while reading article CSV files
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("{} is missing required columns: {}", .path.display(), .missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },
    #[error("failed to read {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("no usable articles in {}", .0.display())]
    Empty(PathBuf),
}

/// A single news article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub text: String,
    pub subject: String,
    /// Date exactly as it appears in the source file
    pub date: String,
    pub label: Label,
    /// Parsed publication date, if the raw date was recognised
    pub published: Option<NaiveDate>,
    /// Cleaned token string of title + text
    pub clean: String,
}

impl Article {
    pub fn new(title: &str, text: &str, subject: &str, date: &str, label: Label) -> Self {
        Self {
            title: title.trim().to_string(),
            text: text.trim().to_string(),
            subject: subject.trim().to_string(),
            date: date.trim().to_string(),
            label,
            published: parse_date(date),
            clean: String::new(),
        }
    }

    /// Title and body joined for classification
    pub fn content(&self) -> String {
        if self.title.is_empty() {
            self.text.clone()
        } else {
            format!("{} {}", self.title, self.text)
        }
    }
}

/// Parse the date formats found in news CSV exports.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 5] = ["%B %d, %Y", "%b %d, %Y", "%d-%b-%y", "%Y-%m-%d", "%b %d %Y"];
    let raw = raw.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// How the two classes are sampled when building a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Reduce both classes to the size of the smaller one
    pub balance: bool,
    /// Cap on articles kept per class
    pub sample_per_class: Option<usize>,
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            balance: true,
            sample_per_class: Some(5000),
            seed: 42,
        }
    }
}

/// A labelled, cleaned article collection
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub articles: Vec<Article>,
}

impl Dataset {
    /// Load the fake and true CSV files, sample them and clean every article
    pub fn load(
        fake_path: &Path,
        true_path: &Path,
        sampling: &SamplingConfig,
        cleaner: &TextCleaner,
    ) -> Result<Self, DatasetError> {
        let mut fake = read_articles(fake_path, Label::Fake)?;
        let mut real = read_articles(true_path, Label::Real)?;
        tracing::info!(
            "Read {} fake articles from {} and {} true articles from {}",
            fake.len(),
            fake_path.display(),
            real.len(),
            true_path.display()
        );

        let mut rng = ChaCha8Rng::seed_from_u64(sampling.seed);
        let mut cap = sampling.sample_per_class.unwrap_or(usize::MAX);
        if sampling.balance {
            cap = cap.min(fake.len()).min(real.len());
        }
        sample_in_place(&mut fake, cap, &mut rng);
        sample_in_place(&mut real, cap, &mut rng);

        let mut articles: Vec<Article> = fake.into_iter().chain(real).collect();
        articles.shuffle(&mut rng);

        let mut dataset = Self { articles };
        dataset.clean_all(cleaner);
        tracing::info!("Dataset ready: {} articles", dataset.len());
        Ok(dataset)
    }

    /// Build a dataset from articles that have not been cleaned yet
    pub fn from_articles(articles: Vec<Article>, cleaner: &TextCleaner) -> Self {
        let mut dataset = Self { articles };
        dataset.clean_all(cleaner);
        dataset
    }

    fn clean_all(&mut self, cleaner: &TextCleaner) {
        self.articles
            .par_iter_mut()
            .for_each(|article| article.clean = cleaner.clean(&article.content()));
    }

    /// Generated dataset for demos and tests
    pub fn synthetic(size: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let fake_phrases = [
            "BREAKING: Shocking secret the elites are hiding",
            "You won't believe this miracle cure doctors hate",
            "Watch: outraged patriots expose the deep state hoax",
            "Leaked video proves the conspiracy is real",
            "Share before it gets deleted: the truth they buried",
        ];
        let real_phrases = [
            "WASHINGTON (Reuters) - Senate committee approves budget proposal",
            "Officials said on Tuesday the ministry will review the policy",
            "The central bank held interest rates steady, a spokesman said",
            "Lawmakers debated the infrastructure bill in parliament",
            "Election commission published preliminary turnout figures",
        ];
        let fake_subjects = ["News", "politics", "left-news"];
        let real_subjects = ["politicsNews", "worldnews"];

        let articles: Vec<Article> = (0..size)
            .map(|i| {
                let is_fake = i % 2 == 0;
                let (phrases, subjects, label) = if is_fake {
                    (&fake_phrases, &fake_subjects[..], Label::Fake)
                } else {
                    (&real_phrases, &real_subjects[..], Label::Real)
                };
                let title = phrases[rng.gen_range(0..phrases.len())];
                let body = phrases[rng.gen_range(0..phrases.len())];
                let subject = subjects[rng.gen_range(0..subjects.len())];
                let date = NaiveDate::from_ymd_opt(2017, rng.gen_range(1..=12), rng.gen_range(1..=28))
                    .map(|d| d.format("%B %d, %Y").to_string())
                    .unwrap_or_default();
                Article::new(title, &format!("{} - story {}", body, i), subject, &date, label)
            })
            .collect();

        Self::from_articles(articles, &TextCleaner::new())
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.articles.iter().map(|a| a.label).collect()
    }

    pub fn clean_texts(&self) -> Vec<&str> {
        self.articles.iter().map(|a| a.clean.as_str()).collect()
    }

    /// Stratified train/test split; both halves keep the class ratio
    pub fn split(&self, test_fraction: f64, seed: u64) -> (Dataset, Dataset) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for label in [Label::Fake, Label::Real] {
            let mut group: Vec<&Article> = self.articles.iter().filter(|a| a.label == label).collect();
            group.shuffle(&mut rng);
            let n_test = ((group.len() as f64) * test_fraction).round() as usize;
            let n_test = n_test.min(group.len());
            test.extend(group[..n_test].iter().map(|a| (*a).clone()));
            train.extend(group[n_test..].iter().map(|a| (*a).clone()));
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);
        (Dataset { articles: train }, Dataset { articles: test })
    }

    /// Label distribution
    pub fn label_distribution(&self) -> HashMap<Label, usize> {
        let mut dist = HashMap::new();
        for article in &self.articles {
            *dist.entry(article.label).or_insert(0) += 1;
        }
        dist
    }

    pub fn summary(&self) -> DatasetSummary {
        let mut summary = DatasetSummary {
            total: self.articles.len(),
            ..Default::default()
        };
        for article in &self.articles {
            *summary.by_label.entry(article.label.as_str().to_string()).or_insert(0) += 1;
            let subject = if article.subject.is_empty() { "(none)" } else { article.subject.as_str() };
            *summary.by_subject.entry(subject.to_string()).or_insert(0) += 1;
            match article.published {
                Some(date) => {
                    *summary.by_month.entry(date.format("%Y-%m").to_string()).or_insert(0) += 1;
                }
                None => summary.undated += 1,
            }
        }
        summary
    }
}

/// Article counts per label, subject and month
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total: usize,
    pub by_label: BTreeMap<String, usize>,
    pub by_subject: BTreeMap<String, usize>,
    pub by_month: BTreeMap<String, usize>,
    pub undated: usize,
}

fn sample_in_place(articles: &mut Vec<Article>, cap: usize, rng: &mut ChaCha8Rng) {
    if articles.len() > cap {
        articles.shuffle(rng);
        articles.truncate(cap);
    }
}

/// Read one CSV file of articles, all carrying `label`.
pub fn read_articles(path: &Path, label: Label) -> Result<Vec<Article>, DatasetError> {
    if !path.is_file() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|e| csv_err(csv::Error::from(e)))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| column(c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DatasetError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    }

    // All four are present at this point.
    let idx: Vec<usize> = REQUIRED_COLUMNS.iter().filter_map(|c| column(c)).collect();

    let mut articles = Vec::new();
    let mut skipped = 0usize;
    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(csv_err)?;
        let field = |i: usize| record.get(idx[i]).unwrap_or("");
        let (title, text) = (field(0), field(1));
        if title.trim().is_empty() && text.trim().is_empty() {
            tracing::debug!("Skipping empty row {} in {}", row + 1, path.display());
            skipped += 1;
            continue;
        }
        articles.push(Article::new(title, text, field(2), field(3), label));
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} empty rows in {}", skipped, path.display());
    }
    if articles.is_empty() {
        return Err(DatasetError::Empty(path.to_path_buf()));
    }
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_and_label() {
        let dir = tempfile::tempdir().unwrap();
        let fake = write_csv(
            dir.path(),
            "Fake.csv",
            "title,text,subject,date\n\
             Shocking secret revealed,Insiders claim the elites lied,News,\"December 31, 2017\"\n\
             Miracle cure,Doctors hate this trick,politics,\"Dec 30, 2017\"\n",
        );
        let real = write_csv(
            dir.path(),
            "True.csv",
            "title,text,subject,date\n\
             Senate passes bill,WASHINGTON (Reuters) - The Senate voted,politicsNews,\"December 29, 2017 \"\n\
             Rates held,The central bank said rates stay,worldnews,31-Dec-17\n\
             Turnout figures,Officials published figures,worldnews,2017-11-05\n",
        );

        let sampling = SamplingConfig { balance: true, sample_per_class: None, seed: 7 };
        let dataset = Dataset::load(&fake, &real, &sampling, &TextCleaner::new()).unwrap();

        // balanced down to the smaller class
        assert_eq!(dataset.len(), 4);
        let dist = dataset.label_distribution();
        assert_eq!(dist[&Label::Fake], 2);
        assert_eq!(dist[&Label::Real], 2);
        assert!(dataset.articles.iter().all(|a| !a.clean.is_empty()));
        assert!(dataset.articles.iter().all(|a| a.published.is_some()));
    }

    #[test]
    fn test_sample_cap_without_balance_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake_csv = String::from("title,text,subject,date\n");
        for i in 0..30 {
            fake_csv.push_str(&format!("Hoax number {i},Leaked video story {i},News,\"May 1, 2017\"\n"));
        }
        let mut real_csv = String::from("title,text,subject,date\n");
        for i in 0..10 {
            real_csv.push_str(&format!("Senate vote {i},Officials said budget {i},worldnews,2017-05-01\n"));
        }
        let fake = write_csv(dir.path(), "Fake.csv", &fake_csv);
        let real = write_csv(dir.path(), "True.csv", &real_csv);

        let sampling = SamplingConfig { balance: false, sample_per_class: Some(12), seed: 99 };
        let first = Dataset::load(&fake, &real, &sampling, &TextCleaner::new()).unwrap();
        let second = Dataset::load(&fake, &real, &sampling, &TextCleaner::new()).unwrap();

        let dist = first.label_distribution();
        assert_eq!(dist[&Label::Fake], 12);
        assert_eq!(dist[&Label::Real], 10);

        let titles = |d: &Dataset| d.articles.iter().map(|a| a.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&first), titles(&second));

        let other_seed = SamplingConfig { seed: 100, ..sampling };
        let third = Dataset::load(&fake, &real, &other_seed, &TextCleaner::new()).unwrap();
        assert_eq!(third.len(), 22);
    }

    #[test]
    fn test_missing_columns_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "bad.csv", "title,body,date\nA,B,C\n");

        match read_articles(&path, Label::Fake) {
            Err(DatasetError::MissingColumns { missing, .. }) => {
                assert_eq!(missing, vec!["text".to_string(), "subject".to_string()]);
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_articles(&dir.path().join("nope.csv"), Label::Real);
        assert!(matches!(result, Err(DatasetError::NotFound(_))));
    }

    #[test]
    fn test_header_case_and_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "mixed.csv",
            " Title ,TEXT,Subject,Date,extra\nHello world,Body text here,News,\"May 1, 2016\",x\n,,,,\n",
        );
        let articles = read_articles(&path, Label::Real).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Hello world");
        assert_eq!(articles[0].subject, "News");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2017, 12, 31);
        assert_eq!(parse_date("December 31, 2017"), expected);
        assert_eq!(parse_date("Dec 31, 2017"), expected);
        assert_eq!(parse_date("31-Dec-17"), expected);
        assert_eq!(parse_date("2017-12-31"), expected);
        assert_eq!(parse_date("https://example.com"), None);
    }

    #[test]
    fn test_synthetic_dataset() {
        let dataset = Dataset::synthetic(100, 42);
        assert_eq!(dataset.len(), 100);
        let dist = dataset.label_distribution();
        assert_eq!(dist[&Label::Fake], 50);
        assert_eq!(dist[&Label::Real], 50);
    }

    #[test]
    fn test_stratified_split() {
        let dataset = Dataset::synthetic(100, 42);
        let (train, test) = dataset.split(0.2, 1);

        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);
        assert_eq!(test.label_distribution()[&Label::Fake], 10);
        assert_eq!(test.label_distribution()[&Label::Real], 10);
    }

    #[test]
    fn test_summary_counts() {
        let dataset = Dataset::synthetic(20, 3);
        let summary = dataset.summary();
        assert_eq!(summary.total, 20);
        assert_eq!(summary.by_label["fake"], 10);
        assert_eq!(summary.by_subject.values().sum::<usize>(), 20);
        assert_eq!(summary.by_month.values().sum::<usize>() + summary.undated, 20);
    }
}
