use super::{boxed, Branding};
use crate::fetcher::{fetch_all_pages, Fetcher};
use crate::traits::Source;
use crate::types::{Item, KeyKind, MessageField, MessageSpec, NaturalKey, Result, SeenTable};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::info;

pub const NAME: &str = "stackoverflow";

const API_URL: &str = "https://api.stackexchange.com/2.3/questions";
const PAGE_SIZE: u32 = 100;

const TABLE: SeenTable = SeenTable {
    name: "stackoverflow_questions",
    key_column: "question_id",
    key_kind: KeyKind::Integer,
};

const BRANDING: Branding = Branding {
    noun: "question",
    site: "StackOverflow",
    footer: "Stackoverflow Notification",
    username: "StackOverflow Question Notifications",
    icon_emoji: ":stackoverflow:",
    icon_url: "https://emoji.slack-edge.com/T085AJH3L/stackoverflow/35cab7f857fa4681.png",
};

#[derive(Debug, Deserialize)]
struct QuestionsPage {
    #[serde(default)]
    items: Vec<Question>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub display_name: String,
    pub link: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub question_id: i64,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_answered: bool,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub answer_count: u64,
    pub creation_date: i64,
}

impl Item for Question {
    fn natural_key(&self) -> NaturalKey {
        NaturalKey::Int(self.question_id)
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn to_message(&self) -> MessageSpec {
        let answered = if self.is_answered { "✅" } else { "🚫" };

        let mut message = BRANDING.message(&self.link, self.owner.display_name.clone(), self.creation_date);
        message.author_link = self.owner.link.clone();
        message.author_icon = self.owner.profile_image.clone();
        message.title = Some(self.title.clone());
        message.fields = vec![
            MessageField::short("# Views", self.view_count.to_string()),
            MessageField::short("# Answers", self.answer_count.to_string()),
            MessageField::short("Answered", answered),
            MessageField::short("Tags", self.tags.join(", ")),
        ];
        message
    }
}

/// Questions tagged with the search term on one Stack Exchange site, oldest
/// first.
pub struct StackOverflowSource {
    fetcher: Fetcher,
    tag: String,
    site: String,
}

impl StackOverflowSource {
    pub fn new(fetcher: Fetcher, tag: String, site: String) -> Self {
        Self { fetcher, tag, site }
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<Question>> {
        let query = [
            ("tagged", self.tag.clone()),
            ("site", self.site.clone()),
            ("sort", "creation".to_string()),
            ("order", "asc".to_string()),
            ("pagesize", PAGE_SIZE.to_string()),
            ("page", page.to_string()),
        ];
        let response: QuestionsPage = self.fetcher.get_json(API_URL, &query, HeaderMap::new()).await?;
        Ok(response.items)
    }
}

#[async_trait]
impl Source for StackOverflowSource {
    fn name(&self) -> &'static str {
        NAME
    }

    fn table(&self) -> SeenTable {
        TABLE
    }

    async fn fetch(&self) -> Result<Vec<Box<dyn Item>>> {
        let questions = fetch_all_pages(1, |page| self.fetch_page(page)).await?;
        info!(site = %self.site, question_count = questions.len(), "Fetched questions");
        Ok(boxed(questions))
    }
}
