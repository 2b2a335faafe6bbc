//! Named publish-metadata templates.
//!
//! The catalog is fixed at startup. Lookups never fail: an absent, empty or unknown key resolves
//! to the catalog's designated default template.

use crate::error::PipelineError;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Key of the built-in default template.
pub const DEFAULT_TEMPLATE: &str = "christian_lofi";

/// Whether a template targets regular long-form uploads or short-form clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DurationClass {
    Standard,
    Short,
}

/// Who can see an uploaded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyStatus {
    Public,
    Unlisted,
    Private,
}

/// A named bundle of publish metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub key: String,
    pub title: String,
    pub description: String,
    /// Order is significant: it is exposed to the hosting platform as-is.
    pub tags: Vec<String>,
    /// Platform category, e.g. `10` (Music) or `22` (People & Blogs).
    pub category_id: String,
    pub privacy_status: PrivacyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_class: Option<DurationClass>,
}

/// The subset of a [`Template`] that is sent with a publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMetadata<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
    pub category_id: &'a str,
    pub privacy_status: PrivacyStatus,
}

impl Template {
    pub fn metadata(&self) -> PublishMetadata<'_> {
        PublishMetadata {
            title: &self.title,
            description: &self.description,
            tags: &self.tags,
            category_id: &self.category_id,
            privacy_status: self.privacy_status,
        }
    }

    pub fn is_short(&self) -> bool {
        self.duration_class == Some(DurationClass::Short)
    }
}

/// On-disk shape of an alternative catalog.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    default: String,
    templates: Vec<Template>,
}

/// Holds the template catalog and resolves keys against it.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
    default: usize,
}

impl TemplateRegistry {
    /// Builds a registry from `templates`, with `default_key` as the fallback.
    ///
    /// Fails if keys are not unique or the default is not part of the catalog.
    pub fn new(templates: Vec<Template>, default_key: &str) -> eyre::Result<Self> {
        let mut seen = HashSet::new();
        for template in &templates {
            if !seen.insert(template.key.as_str()) {
                eyre::bail!("duplicate template key `{}`", template.key);
            }
        }
        let default = templates
            .iter()
            .position(|t| t.key == default_key)
            .ok_or_else(|| eyre::eyre!("default template `{default_key}` is not in the catalog"))?;
        Ok(Self { templates, default })
    }

    /// The catalog that ships with the pipeline.
    pub fn builtin() -> Self {
        let templates = BUILTIN.iter().map(TemplateSeed::to_template).collect();
        Self::new(templates, DEFAULT_TEMPLATE).expect("built-in catalog is consistent")
    }

    /// Loads a catalog from a JSON file of the form `{ "default": key, "templates": [...] }`.
    pub async fn from_json_file(path: &Path) -> Result<Self, PipelineError> {
        let load = async {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read template catalog {}", path.display()))?;
            let catalog: CatalogFile = serde_json::from_str(&raw)
                .with_context(|| format!("parse template catalog {}", path.display()))?;
            Self::new(catalog.templates, &catalog.default)
                .with_context(|| format!("validate template catalog {}", path.display()))
        };
        load.await.map_err(PipelineError::configuration)
    }

    /// The built-in catalog, or the one at `path` if given.
    pub async fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        match path {
            Some(path) => Self::from_json_file(path).await,
            None => Ok(Self::builtin()),
        }
    }

    /// Resolves `key` to a template, silently falling back to the default.
    pub fn resolve(&self, key: Option<&str>) -> &Template {
        key.filter(|k| !k.is_empty())
            .and_then(|k| self.get(k))
            .unwrap_or_else(|| self.default_template())
    }

    /// `key` if it names no template and would fall back to the default.
    ///
    /// Absent and empty keys are a deliberate request for the default, so they are never
    /// unknown.
    pub fn unknown_key<'k>(&self, key: Option<&'k str>) -> Option<&'k str> {
        key.filter(|k| !k.is_empty() && self.get(k).is_none())
    }

    /// Exact lookup, without fallback.
    pub fn get(&self, key: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.key == key)
    }

    pub fn default_template(&self) -> &Template {
        &self.templates[self.default]
    }

    /// Templates in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.key.as_str())
    }

}

struct TemplateSeed {
    key: &'static str,
    title: &'static str,
    description: &'static str,
    tags: &'static [&'static str],
    category_id: &'static str,
    playlist: Option<&'static str>,
    duration_class: Option<DurationClass>,
}

impl TemplateSeed {
    fn to_template(&self) -> Template {
        Template {
            key: self.key.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            tags: self.tags.iter().map(|t| t.to_string()).collect(),
            category_id: self.category_id.to_string(),
            privacy_status: PrivacyStatus::Public,
            playlist: self.playlist.map(str::to_string),
            duration_class: self.duration_class,
        }
    }
}

const MUSIC: &str = "10";
const PEOPLE_AND_BLOGS: &str = "22";

const BUILTIN: &[TemplateSeed] = &[
    TemplateSeed {
        key: "christian_lofi",
        title: "🌙 Peaceful Worship Lofi - 1 Hour | Christian Meditation Music",
        description: "🙏 Welcome to peaceful Christian lofi worship music.

Perfect for:
• Prayer and meditation
• Quiet time with God
• Studying and reflection
• Sleeping and rest

🎵 Soothing lofi beats with faith-filled lyrics
✨ Find peace in His presence today

📖 \"Be still, and know that I am God\" - Psalm 46:10

#christianlofi #worshipmusic #peacefulmusic #christianmusic #faith #meditation",
        tags: &[
            "christian lofi",
            "worship music",
            "peaceful music",
            "christian meditation",
            "faith music",
            "prayer music",
            "christian ambient",
            "sleep worship",
        ],
        category_id: MUSIC,
        playlist: Some("Christian Lofi Worship"),
        duration_class: None,
    },
    TemplateSeed {
        key: "lofi_nature",
        title: "🌿 Lofi Nature Vibes - 1 Hour | Cozy Study & Relaxation",
        description: "🌿 Welcome to peaceful lofi nature vibes!

Perfect for:
• Studying and focus
• Working from home
• Meditation and yoga
• Sleeping and relaxation

🎶 Calming lofi beats with stunning nature visuals
✨ Sit back, breathe, and enjoy

#lofi #studymusic #nature #relaxation #chill #focusmusic #ambient #sleepmusic",
        tags: &[
            "lofi",
            "study music",
            "nature",
            "relaxing",
            "chill",
            "focus music",
            "ambient",
            "sleep music",
            "meditation",
        ],
        category_id: MUSIC,
        playlist: None,
        duration_class: None,
    },
    TemplateSeed {
        key: "nature_ambient",
        title: "🌊 Peaceful Ocean Waves - 2 Hours | Nature Sounds for Sleep & Relaxation",
        description: "🌊 Pure ocean waves for deep relaxation.

Features:
• Crystal clear ocean sounds
• No music - pure nature
• Perfect for sleeping
• Stress relief and meditation

🎧 Put on your headphones, close your eyes,
and let the waves wash your worries away

#oceansounds #naturesounds #sleepmusic #relaxation #meditation #whitenoise #stressrelief",
        tags: &[
            "ocean sounds",
            "nature sounds",
            "sleep music",
            "relaxation",
            "whitenoise",
            "meditation",
            "nature ambient",
            "ocean waves",
        ],
        category_id: MUSIC,
        playlist: None,
        duration_class: None,
    },
    TemplateSeed {
        key: "worship",
        title: "✝️ Uplifting Christian Worship - 1 Hour | Praise & Adoration",
        description: "✝️ Powerful worship music to lift your spirit.

Perfect for:
• Morning devotion
• Worship sessions
• Prayer time
• Encouragement

🎤 Let these songs draw you closer to God
🙏 May His presence fill your day

📖 \"Enter His gates with thanksgiving\" - Psalm 100:4

#christianworship #praiseandworship #christianmusic #worship2025 #godmusic #faith",
        tags: &[
            "christian worship",
            "praise and worship",
            "christian music",
            "worship music",
            "christian",
            "god",
            "faith",
            "encouragement",
        ],
        category_id: MUSIC,
        playlist: None,
        duration_class: None,
    },
    TemplateSeed {
        key: "shorts",
        title: "🌅 60-Second Peace | Morning Meditation",
        description: "🌅 Start your day with 60 seconds of peace.

#shorts #meditation #mindfulness #peace #morning #relax",
        tags: &[
            "shorts",
            "meditation",
            "peace",
            "mindfulness",
            "morning",
            "relax",
            "60 seconds",
        ],
        category_id: PEOPLE_AND_BLOGS,
        playlist: None,
        duration_class: Some(DurationClass::Short),
    },
    TemplateSeed {
        key: "bedtime_prayer",
        title: "🌙 Sleep Prayer Meditation - 1 Hour | Rest in God's Presence",
        description: "🌙 Let go of the day and find peace in God's presence.

Perfect for:
• Falling asleep
• Night prayer
• Stress relief
• Spiritual rest

✨ Rest in His love as you sleep
🙏 Surrender your worries to Him

📖 \"In peace I will lie down and sleep\" - Psalm 4:8

#bedtimeprayer #sleep #christianmeditation #nightprayer #peace #godlove #spiritualrest",
        tags: &[
            "bedtime prayer",
            "sleep",
            "christian meditation",
            "night prayer",
            "peace",
            "god love",
            "spiritual rest",
            "sleep worship",
            "prayer music",
        ],
        category_id: MUSIC,
        playlist: Some("Sleep Prayer"),
        duration_class: None,
    },
    TemplateSeed {
        key: "morning_devotion",
        title: "☀️ Morning Devotional - 1 Hour | Start Your Day with God",
        description: "☀️ Begin your morning in His presence.

Perfect for:
• Morning routine
• Daily devotion
• Positive start
• Spiritual encouragement

🌅 Let His word guide your day
🙏 May God bless your day ahead

📖 \"This is the day the Lord has made\" - Psalm 118:24

#morningdevotion #morningprayer #devotional #god #faith #christian #startyourday #blessed",
        tags: &[
            "morning devotion",
            "morning prayer",
            "devotional",
            "god",
            "faith",
            "christian",
            "daily bread",
            "spiritual morning",
            "encouragement",
        ],
        category_id: MUSIC,
        playlist: Some("Morning Devotions"),
        duration_class: None,
    },
    TemplateSeed {
        key: "scripture_ambient",
        title: "📖 Scripture Meditation - KJV | Psalm 23 - 1 Hour",
        description: "📖 Meditate on God's Word with peaceful ambient music.

Featured Scripture:
\"The Lord is my shepherd; I shall not want.
He maketh me to lie down in green pastures...\"

🎧 Listen and reflect on His promises
✨ Let His word sink into your heart

📖 Psalm 23 (KJV)

#scripture #psalm23 #bible #christian #meditation #godword #faith #kjv #biblemeditation",
        tags: &[
            "scripture",
            "psalm 23",
            "bible",
            "christian meditation",
            "god word",
            "faith",
            "kjv",
            "bible meditation",
            "word of god",
            "bible study music",
        ],
        category_id: MUSIC,
        playlist: Some("Scripture Meditations"),
        duration_class: None,
    },
    TemplateSeed {
        key: "gospel_testimony",
        title: "✝️ Gospel Music Mix - 1 Hour | Praise & Worship",
        description: "✝️ Uplifting gospel music to strengthen your faith.

Perfect for:
• Gospel music lovers
• Praise and worship
• Encouragement
• Spiritual upliftment

🎤 Feel the power of His love through music
🙏 Let the songs lift your spirit

#gospel #gospelmusic #christianmusic #praise #worship #god #faith #uplifting #blessed",
        tags: &[
            "gospel",
            "gospel music",
            "christian music",
            "praise",
            "worship",
            "god",
            "faith",
            "uplifting",
            "gospel mix",
            "christian",
        ],
        category_id: MUSIC,
        playlist: Some("Gospel Mix"),
        duration_class: None,
    },
    TemplateSeed {
        key: "piano_worship",
        title: "🎹 Peaceful Piano Worship - 1 Hour | Soft Christian Piano",
        description: "🎹 Beautiful piano melodies for worship and reflection.

Perfect for:
• Worship time
• Prayer
• Study
• Relaxation

✨ Let the gentle piano lead you to His presence
🙏 Pure worship music for your soul

#pianoworship #christianpiano #worshipmusic #piano #peaceful #god #faith #christianmusic",
        tags: &[
            "piano worship",
            "christian piano",
            "worship music",
            "piano",
            "peaceful",
            "god",
            "faith",
            "christian music",
            "instrumental",
            "soft piano",
        ],
        category_id: MUSIC,
        playlist: Some("Piano Worship"),
        duration_class: None,
    },
    TemplateSeed {
        key: "nature_faith",
        title: "🌿 Nature & Worship - 1 Hour | Scenic Views with Christian Lofi",
        description: "🌿 Stunning nature visuals with worship lofi beats.

Perfect for:
• Relaxation
• Nature appreciation
• Worship
• Background study

🍃 Beautiful nature scenes + faith-filled music
✨ Connect with God's creation

📖 \"The heavens declare the glory of God\" - Psalm 19:1

#nature #christianlofi #worship #natureviews #scenic #relax #faith #godcreation",
        tags: &[
            "nature",
            "christian lofi",
            "worship",
            "nature views",
            "scenic",
            "relax",
            "faith",
            "god creation",
            "nature worship",
            "nature lofi",
        ],
        category_id: MUSIC,
        playlist: Some("Nature & Faith"),
        duration_class: None,
    },
];
