//! Content kinds, their schemas and stored records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::{EntitySchema, FieldDef};

/// Field values keyed by column name
pub type Fields = Map<String, Value>;

/// The content tables managed by the back-office
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    #[serde(rename = "destinations")]
    Destination,
    #[serde(rename = "blog-posts")]
    BlogPost,
    #[serde(rename = "banners")]
    Banner,
    #[serde(rename = "offers")]
    Offer,
    #[serde(rename = "partners")]
    Partner,
    #[serde(rename = "popups")]
    Popup,
    #[serde(rename = "packages")]
    Package,
}

impl ContentKind {
    pub const ALL: [ContentKind; 7] = [
        Self::Destination,
        Self::BlogPost,
        Self::Banner,
        Self::Offer,
        Self::Partner,
        Self::Popup,
        Self::Package,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Destination => "destinations",
            Self::BlogPost => "blog-posts",
            Self::Banner => "banners",
            Self::Offer => "offers",
            Self::Partner => "partners",
            Self::Popup => "popups",
            Self::Package => "packages",
        }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            Self::Destination => &DESTINATIONS,
            Self::BlogPost => &BLOG_POSTS,
            Self::Banner => &BANNERS,
            Self::Offer => &OFFERS,
            Self::Partner => &PARTNERS,
            Self::Popup => &POPUPS,
            Self::Package => &PACKAGES,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Unknown content kind: {}", s))
    }
}

static DESTINATIONS: EntitySchema = EntitySchema {
    kind: ContentKind::Destination,
    table: "destinations",
    title_field: "name",
    flag_field: "is_active",
    group_field: Some("region"),
    singleton_flag: false,
    publish_stamp: None,
    fields: &[
        FieldDef::text("name").required().example("Goa"),
        FieldDef::text("region").required().example("India"),
        FieldDef::text("slug").example("goa"),
        FieldDef::text("tagline").example("Sun, sand and seafood"),
        FieldDef::text("description").example("Beaches and nightlife on the west coast"),
        FieldDef::text("image_url").example("https://cdn.example.com/goa.jpg"),
        FieldDef::list("images").example("https://cdn.example.com/goa-1.jpg;https://cdn.example.com/goa-2.jpg"),
        FieldDef::number("starting_price", 0.0).example("12999"),
        FieldDef::number("rating", 5.0).example("4.7"),
        FieldDef::text("best_time_to_visit").example("November to February"),
        FieldDef::boolean("is_active", true).example("true"),
    ],
};

static BLOG_POSTS: EntitySchema = EntitySchema {
    kind: ContentKind::BlogPost,
    table: "blog_posts",
    title_field: "title",
    flag_field: "published",
    group_field: None,
    singleton_flag: false,
    publish_stamp: Some("published_at"),
    fields: &[
        FieldDef::text("title").required().example("10 things to do in Bali"),
        FieldDef::text("slug").example("10-things-to-do-in-bali"),
        FieldDef::text("excerpt").example("A short guide to the island"),
        FieldDef::text("content").example("Full article body"),
        FieldDef::text("cover_image").example("https://cdn.example.com/bali.jpg"),
        FieldDef::text("author").example("Travel Desk"),
        FieldDef::text("category").example("Guides"),
        FieldDef::list("tags").example("bali;beaches"),
        FieldDef::integer("read_time_minutes", 0).example("6"),
        FieldDef::boolean("published", false).example("false"),
        FieldDef::text("published_at"),
    ],
};

static BANNERS: EntitySchema = EntitySchema {
    kind: ContentKind::Banner,
    table: "banners",
    title_field: "title",
    flag_field: "is_active",
    group_field: None,
    singleton_flag: false,
    publish_stamp: None,
    fields: &[
        FieldDef::text("title").required().example("Summer sale"),
        FieldDef::text("subtitle").example("Up to 30% off international trips"),
        FieldDef::text("image_url").required().example("https://cdn.example.com/banner.jpg"),
        FieldDef::text("mobile_image_url").example("https://cdn.example.com/banner-m.jpg"),
        FieldDef::text("link_url").example("/offers/summer"),
        FieldDef::text("button_text").example("Explore"),
        FieldDef::boolean("is_active", true).example("true"),
    ],
};

static OFFERS: EntitySchema = EntitySchema {
    kind: ContentKind::Offer,
    table: "offers",
    title_field: "title",
    flag_field: "is_active",
    group_field: None,
    singleton_flag: false,
    publish_stamp: None,
    fields: &[
        FieldDef::text("title").required().example("Early bird Europe"),
        FieldDef::text("description").example("Book 60 days ahead"),
        FieldDef::text("discount_text").example("Flat 15% off"),
        FieldDef::integer("discount_percent", 0).example("15"),
        FieldDef::text("image_url").example("https://cdn.example.com/europe.jpg"),
        FieldDef::text("valid_until").example("2026-12-31"),
        FieldDef::list("destinations").example("Paris;Rome;Zurich"),
        FieldDef::text("terms").example("Not valid with other offers"),
        FieldDef::boolean("is_active", true).example("true"),
    ],
};

static PARTNERS: EntitySchema = EntitySchema {
    kind: ContentKind::Partner,
    table: "partners",
    title_field: "name",
    flag_field: "is_active",
    group_field: None,
    singleton_flag: false,
    publish_stamp: None,
    fields: &[
        FieldDef::text("name").required().example("Skyways Air"),
        FieldDef::text("logo_url").example("https://cdn.example.com/skyways.png"),
        FieldDef::text("website_url").example("https://skyways.example.com"),
        FieldDef::text("category").example("Airline"),
        FieldDef::boolean("is_active", true).example("true"),
    ],
};

static POPUPS: EntitySchema = EntitySchema {
    kind: ContentKind::Popup,
    table: "popups",
    title_field: "title",
    flag_field: "is_active",
    group_field: None,
    singleton_flag: true,
    publish_stamp: None,
    fields: &[
        FieldDef::text("title").required().example("Get 10% off your first trip"),
        FieldDef::text("message").example("Subscribe to our newsletter"),
        FieldDef::text("image_url").example("https://cdn.example.com/popup.jpg"),
        FieldDef::text("cta_text").example("Subscribe"),
        FieldDef::text("cta_link").example("/newsletter"),
        FieldDef::integer("delay_seconds", 3).example("5"),
        FieldDef::boolean("is_active", false).example("false"),
    ],
};

static PACKAGES: EntitySchema = EntitySchema {
    kind: ContentKind::Package,
    table: "packages",
    title_field: "title",
    flag_field: "is_active",
    group_field: None,
    singleton_flag: false,
    publish_stamp: None,
    fields: &[
        FieldDef::text("title").required().example("Magical Kerala"),
        FieldDef::text("slug").example("magical-kerala"),
        FieldDef::text("destination").required().example("Kerala"),
        FieldDef::text("duration").example("5N/6D"),
        FieldDef::number("price", 0.0).example("24999"),
        FieldDef::number("original_price", 0.0).example("29999"),
        FieldDef::number("rating", 5.0).example("4.8"),
        FieldDef::list("images").example("https://cdn.example.com/kerala-1.jpg;https://cdn.example.com/kerala-2.jpg"),
        FieldDef::list("includes").example("Hotel;Breakfast;Transfers"),
        FieldDef::list("excludes").example("Flights"),
        FieldDef::list("highlights").example("Houseboat stay;Tea gardens"),
        FieldDef::json("itinerary").example(r#"[{"day":1,"title":"Arrive in Kochi"}]"#),
        FieldDef::list("publish_to").example("featured;honeymoon"),
        FieldDef::boolean("is_active", true).example("true"),
    ],
};

/// A stored content row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: i64,
    pub position: i32,
    #[serde(flatten)]
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    pub fn list(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn title(&self, schema: &EntitySchema) -> &str {
        self.text(schema.title_field).unwrap_or_default()
    }

    pub fn flag(&self, schema: &EntitySchema) -> bool {
        self.fields
            .get(schema.flag_field)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Ordering scope value; `None` when the kind is ordered as one list
    pub fn group(&self, schema: &EntitySchema) -> Option<String> {
        schema
            .group_field
            .map(|g| self.text(g).unwrap_or_default().to_string())
    }
}

/// Move a row one step or to an absolute index within its scope
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MoveInput {
    Step { direction: MoveDirection },
    To { to: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

/// Full explicit order for one scope
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderInput {
    pub ids: Vec<i64>,
    /// Scope value for grouped kinds (destination region)
    #[serde(default)]
    pub group: Option<String>,
}

/// Explicitly set the visibility flag
#[derive(Debug, Clone, Deserialize)]
pub struct FlagInput {
    pub value: bool,
}
