use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::mysql::MySqlRow;

use super::refs::TopicRef;
use crate::database::row::RowExt;

/// Filters for the published FAQ list
#[derive(Debug, Clone, Default)]
pub struct FaqQuery {
    pub category_id: Option<i64>,
    pub search: Option<String>,
    /// Hide articles filed under private categories
    pub public_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqCategoryRef {
    pub category_id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Faq {
    pub faq_id: i64,
    pub category_id: i64,
    pub category: Option<FaqCategoryRef>,
    pub question: String,
    pub answer: String,
    pub keywords: Option<String>,
    pub ispublished: bool,
    pub created: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
}

impl Faq {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let category_id = row.int("category_id")?;
        let category = match category_id {
            0 => None,
            _ => Some(FaqCategoryRef {
                category_id,
                name: row.opt_text("category_name")?,
            }),
        };

        Ok(Self {
            faq_id: row.int("faq_id")?,
            category_id,
            category,
            question: row.text("question")?,
            answer: row.text("answer")?,
            keywords: row.opt_text("keywords")?,
            ispublished: row.flag("ispublished")?,
            created: row.opt_datetime("created")?,
            updated: row.opt_datetime("updated")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqCategory {
    pub category_id: i64,
    pub category_pid: i64,
    pub name: String,
    pub description: Option<String>,
    pub ispublic: bool,
    #[serde(rename = "faqCount")]
    pub faq_count: i64,
    pub created: Option<NaiveDateTime>,
}

impl FaqCategory {
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            category_id: row.int("category_id")?,
            category_pid: row.int("category_pid")?,
            name: row.text("name")?,
            description: row.opt_text("description")?,
            ispublic: row.flag("ispublic")?,
            faq_count: row.int("faq_count")?,
            created: row.opt_datetime("created")?,
        })
    }
}

/// Article with staff notes and related help topics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqDetail {
    #[serde(flatten)]
    pub faq: Faq,
    pub notes: Option<String>,
    pub topics: Vec<TopicRef>,
    #[serde(skip)]
    pub category_public: bool,
}

impl FaqDetail {
    /// Topics are filled in by the caller.
    pub fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            faq: Faq::from_row(row)?,
            notes: row.opt_text("notes")?,
            topics: Vec::new(),
            category_public: row.flag("category_ispublic")?,
        })
    }

    /// Published, and either uncategorized or filed under a public category
    pub fn is_public(&self) -> bool {
        self.faq.ispublished && (self.faq.category_id == 0 || self.category_public)
    }
}
