//! Markdown kanban board library.
//! A board document (front matter, heading + list lanes, archive, settings footer) is parsed into
//! a lane tree with structured item metadata, and formatted back into the same text.

pub mod core {
    use chrono::{NaiveDate, NaiveTime};
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;
    use uuid::Uuid;

    use crate::settings::BoardSettings;

    /* ------------------------------- IDs ------------------------------- */

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LaneId(pub Uuid);

    impl LaneId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ItemId(pub Uuid);

    impl ItemId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    /* ------------------------------ Aggregate ------------------------------ */

    /// Aggregate root: a single board document.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Board {
        /// Path of the source document; the board identity derives from it.
        pub path: Option<PathBuf>,

        /// Top-level lanes in document order.
        #[serde(default)]
        pub lanes: Vec<Lane>,

        /// Items under the archive heading. Never shared with lanes.
        #[serde(default)]
        pub archive: Vec<Item>,

        /// Front matter, passed through untouched.
        #[serde(default)]
        pub frontmatter: IndexMap<String, serde_yaml::Value>,

        /// Settings footer, passed through untouched.
        #[serde(default)]
        pub settings: BoardSettings,

        #[serde(skip)]
        pub errors: Vec<String>,
    }

    impl Board {
        pub fn new(path: Option<PathBuf>) -> Self {
            Self {
                path,
                lanes: vec![],
                archive: vec![],
                frontmatter: IndexMap::new(),
                settings: BoardSettings::default(),
                errors: vec![],
            }
        }

        pub fn id(&self) -> String {
            match &self.path {
                Some(path) => path.display().to_string(),
                None => "untitled".to_string(),
            }
        }
    }

    /* ------------------------------ Entities ------------------------------ */

    /// A named group of items; one heading section of the document.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Lane {
        pub id: LaneId,
        /// Raw heading text with `<br>` already turned into newlines.
        pub title: String,
        /// 1 is top level; a nested lane is always deeper than its parent.
        pub level: u8,
        #[serde(default)]
        pub should_mark_items_complete: bool,
        /// Item cap from a trailing `(N)` in the heading.
        pub max_items: Option<u32>,
        pub sort: Option<LaneSort>,
        /// Back-reference for lookups only; ownership lives in `children` of the parent.
        pub parent_id: Option<LaneId>,
        #[serde(default)]
        pub children: Vec<LaneChild>,
    }

    impl Lane {
        pub fn new(title: impl Into<String>, level: u8) -> Self {
            Self {
                id: LaneId::new(),
                title: title.into(),
                level,
                should_mark_items_complete: false,
                max_items: None,
                sort: None,
                parent_id: None,
                children: vec![],
            }
        }

        /// Items directly owned by this lane, in order.
        pub fn items(&self) -> impl Iterator<Item = &Item> {
            self.children.iter().filter_map(|child| match child {
                LaneChild::Item(item) => Some(item),
                LaneChild::Lane(_) => None,
            })
        }

        /// Lanes directly nested in this lane, in order.
        pub fn lanes(&self) -> impl Iterator<Item = &Lane> {
            self.children.iter().filter_map(|child| match child {
                LaneChild::Lane(lane) => Some(lane),
                LaneChild::Item(_) => None,
            })
        }

        /// Appends a nested lane, fixing up its back-reference.
        pub fn push_lane(&mut self, mut lane: Lane) {
            lane.parent_id = Some(self.id);
            self.children.push(LaneChild::Lane(lane));
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "camelCase")]
    pub enum LaneChild {
        Lane(Lane),
        Item(Item),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum LaneSort {
        Title,
        Date,
        Tags,
    }

    /// One task entry in a lane or in the archive.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Item {
        pub id: ItemId,
        pub data: ItemData,
    }

    impl Item {
        pub fn new(data: ItemData) -> Self {
            Self {
                id: ItemId::new(),
                data,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ItemData {
        pub checked: bool,
        /// Exact character between the brackets when checked; `' '` otherwise.
        pub check_char: char,
        /// Author text; only block id and line breaks are normalised.
        pub title_raw: String,
        /// Display text with moved annotations cut out.
        pub title: String,
        /// Flattened text used for filtering.
        pub title_search: String,
        pub block_id: Option<String>,
        #[serde(default)]
        pub metadata: ItemMetadata,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ItemMetadata {
        pub date_str: Option<String>,
        pub date: Option<NaiveDate>,
        pub time_str: Option<String>,
        pub time: Option<NaiveTime>,
        /// `#`-prefixed, sorted with `item::tag_order`, no duplicates.
        #[serde(default)]
        pub tags: Vec<String>,
        pub file_accessor: Option<FileAccessor>,
        pub file_metadata: Option<IndexMap<String, String>>,
        #[serde(default)]
        pub file_metadata_order: Vec<String>,
        /// Offsets are relative to `ItemData::title_raw`.
        #[serde(default)]
        pub inline_fields: Vec<InlineField>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FileAccessor {
        pub target: String,
        pub is_embed: bool,
        pub strip_heading: bool,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct InlineField {
        pub key: String,
        pub value: String,
        pub span: SourceRange,
        pub kind: FieldKind,
    }

    /// Task-scheduling keys (`due`, `scheduled`, ...) versus everything else.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum FieldKind {
        Task,
        User,
    }

    /* ---------------------------- Value Objects ---------------------------- */

    /// Half-open byte range.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct SourceRange {
        pub start: usize,
        pub end: usize,
    }

    impl SourceRange {
        pub fn new(start: usize, end: usize) -> Self {
            Self { start, end }
        }

        pub fn slice<'a>(&self, source: &'a str) -> &'a str {
            &source[self.start..self.end]
        }

        pub fn len(&self) -> usize {
            self.end.saturating_sub(self.start)
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        pub fn overlaps(&self, other: &SourceRange) -> bool {
            self.start < other.end && other.start < self.end
        }

        pub fn contains(&self, offset: usize) -> bool {
            self.start <= offset && offset < self.end
        }

        /// Re-expresses this range relative to `origin`.
        pub fn relative_to(&self, origin: usize) -> SourceRange {
            SourceRange {
                start: self.start.saturating_sub(origin),
                end: self.end.saturating_sub(origin),
            }
        }
    }

    /* ---------------------------- Errors (domain) ---------------------------- */

    #[derive(Debug, thiserror::Error)]
    pub enum BoardError {
        #[error("failed to parse document ({stage}): {message}")]
        DocumentParse { stage: &'static str, message: String },
        #[error("cannot decompose list item: {0}")]
        ItemDecompose(String),
        #[error("deletion {requested:?} overlaps already marked {existing:?}")]
        OverlappingDeletion {
            existing: SourceRange,
            requested: SourceRange,
        },
        #[error("range {range:?} is not valid for text of length {len}")]
        InvalidRange { range: SourceRange, len: usize },
        #[error("lane hierarchy is inconsistent: {0}")]
        Hierarchy(String),
        #[error("no lane or item with id {0}")]
        NotFound(String),
        #[error("failed to encode {what}: {message}")]
        Encode { what: &'static str, message: String },
    }
}

pub mod settings {
    //! Board settings as stored in the JSON footer, layered lookup over global defaults,
    //! and the localized tokens the document format depends on.

    use indexmap::IndexMap;
    use log::warn;
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
    pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";
    pub const DEFAULT_DONE_CHAR: char = 'x';
    pub const DEFAULT_LANE_WIDTH: u32 = 272;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum InlineMetadataPosition {
        #[default]
        Body,
        Footer,
        MetadataTable,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum InsertionMethod {
        Prepend,
        PrependCompact,
        #[default]
        Append,
    }

    /// Keys understood by the lookup; everything else is carried in `BoardSettings::extra`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum SettingKey {
        KanbanPlugin,
        MoveTags,
        MoveDates,
        MoveTaskMetadata,
        InlineMetadataPosition,
        NewCardInsertionMethod,
        LaneWidth,
        ListCollapse,
        DateFormat,
        TimeFormat,
        DoneChar,
    }

    impl SettingKey {
        pub const ALL: [SettingKey; 11] = [
            SettingKey::KanbanPlugin,
            SettingKey::MoveTags,
            SettingKey::MoveDates,
            SettingKey::MoveTaskMetadata,
            SettingKey::InlineMetadataPosition,
            SettingKey::NewCardInsertionMethod,
            SettingKey::LaneWidth,
            SettingKey::ListCollapse,
            SettingKey::DateFormat,
            SettingKey::TimeFormat,
            SettingKey::DoneChar,
        ];

        pub fn as_str(&self) -> &'static str {
            match self {
                SettingKey::KanbanPlugin => "kanban-plugin",
                SettingKey::MoveTags => "move-tags",
                SettingKey::MoveDates => "move-dates",
                SettingKey::MoveTaskMetadata => "move-task-metadata",
                SettingKey::InlineMetadataPosition => "inline-metadata-position",
                SettingKey::NewCardInsertionMethod => "new-card-insertion-method",
                SettingKey::LaneWidth => "lane-width",
                SettingKey::ListCollapse => "list-collapse",
                SettingKey::DateFormat => "date-format",
                SettingKey::TimeFormat => "time-format",
                SettingKey::DoneChar => "done-char",
            }
        }

        pub fn from_name(name: &str) -> Option<Self> {
            Self::ALL.into_iter().find(|key| key.as_str() == name)
        }
    }

    /// Board-local settings. Unset keys fall back to the global layer.
    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case", from = "IndexMap<String, Value>")]
    pub struct BoardSettings {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub kanban_plugin: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub move_tags: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub move_dates: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub move_task_metadata: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub inline_metadata_position: Option<InlineMetadataPosition>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub new_card_insertion_method: Option<InsertionMethod>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub lane_width: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub list_collapse: Option<Vec<bool>>,
        /// chrono format string for `@{date}` values.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub date_format: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub time_format: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub done_char: Option<char>,
        /// Unknown keys and known keys with unusable values, kept verbatim.
        #[serde(flatten)]
        pub extra: IndexMap<String, Value>,
    }

    impl From<IndexMap<String, Value>> for BoardSettings {
        fn from(map: IndexMap<String, Value>) -> Self {
            let mut settings = BoardSettings::default();
            for (name, value) in map {
                match SettingKey::from_name(&name) {
                    Some(key) => {
                        if !settings.assign(key, &value) {
                            warn!("ignoring setting {name}: unexpected value {value}");
                            settings.extra.insert(name, value);
                        }
                    }
                    None => {
                        settings.extra.insert(name, value);
                    }
                }
            }
            settings
        }
    }

    fn assign<T: DeserializeOwned>(slot: &mut Option<T>, value: &Value) -> bool {
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => {
                *slot = Some(parsed);
                true
            }
            Err(_) => false,
        }
    }

    fn encode<T: Serialize>(slot: &Option<T>) -> Option<Value> {
        slot.as_ref().and_then(|v| serde_json::to_value(v).ok())
    }

    impl BoardSettings {
        /// Stores `value` under `key`; returns false when the value has the wrong shape.
        pub fn assign(&mut self, key: SettingKey, value: &Value) -> bool {
            match key {
                SettingKey::KanbanPlugin => assign(&mut self.kanban_plugin, value),
                SettingKey::MoveTags => assign(&mut self.move_tags, value),
                SettingKey::MoveDates => assign(&mut self.move_dates, value),
                SettingKey::MoveTaskMetadata => assign(&mut self.move_task_metadata, value),
                SettingKey::InlineMetadataPosition => {
                    assign(&mut self.inline_metadata_position, value)
                }
                SettingKey::NewCardInsertionMethod => {
                    assign(&mut self.new_card_insertion_method, value)
                }
                SettingKey::LaneWidth => assign(&mut self.lane_width, value),
                SettingKey::ListCollapse => assign(&mut self.list_collapse, value),
                SettingKey::DateFormat => assign(&mut self.date_format, value),
                SettingKey::TimeFormat => assign(&mut self.time_format, value),
                SettingKey::DoneChar => assign(&mut self.done_char, value),
            }
        }

        pub fn value_of(&self, key: SettingKey) -> Option<Value> {
            let typed = match key {
                SettingKey::KanbanPlugin => encode(&self.kanban_plugin),
                SettingKey::MoveTags => encode(&self.move_tags),
                SettingKey::MoveDates => encode(&self.move_dates),
                SettingKey::MoveTaskMetadata => encode(&self.move_task_metadata),
                SettingKey::InlineMetadataPosition => encode(&self.inline_metadata_position),
                SettingKey::NewCardInsertionMethod => encode(&self.new_card_insertion_method),
                SettingKey::LaneWidth => encode(&self.lane_width),
                SettingKey::ListCollapse => encode(&self.list_collapse),
                SettingKey::DateFormat => encode(&self.date_format),
                SettingKey::TimeFormat => encode(&self.time_format),
                SettingKey::DoneChar => encode(&self.done_char),
            };
            typed.or_else(|| self.extra.get(key.as_str()).cloned())
        }
    }

    /// Board-local settings layered over optional global defaults.
    #[derive(Debug, Clone, Copy)]
    pub struct SettingsLookup<'a> {
        local: &'a BoardSettings,
        global: Option<&'a BoardSettings>,
    }

    impl<'a> SettingsLookup<'a> {
        pub fn new(local: &'a BoardSettings, global: Option<&'a BoardSettings>) -> Self {
            Self { local, global }
        }

        pub fn get(&self, key: SettingKey) -> Option<Value> {
            self.local
                .value_of(key)
                .or_else(|| self.global.and_then(|g| g.value_of(key)))
        }

        fn pick<T>(&self, field: impl Fn(&'a BoardSettings) -> Option<T>) -> Option<T> {
            field(self.local).or_else(|| self.global.and_then(&field))
        }

        pub fn move_tags(&self) -> bool {
            self.pick(|s| s.move_tags).unwrap_or(false)
        }

        pub fn move_dates(&self) -> bool {
            self.pick(|s| s.move_dates).unwrap_or(false)
        }

        pub fn move_task_metadata(&self) -> bool {
            self.pick(|s| s.move_task_metadata).unwrap_or(false)
        }

        pub fn inline_metadata_position(&self) -> InlineMetadataPosition {
            self.pick(|s| s.inline_metadata_position)
                .unwrap_or_default()
        }

        pub fn new_card_insertion_method(&self) -> InsertionMethod {
            self.pick(|s| s.new_card_insertion_method)
                .unwrap_or_default()
        }

        pub fn lane_width(&self) -> u32 {
            self.pick(|s| s.lane_width).unwrap_or(DEFAULT_LANE_WIDTH)
        }

        pub fn list_collapse(&self) -> &'a [bool] {
            self.pick(|s| s.list_collapse.as_deref()).unwrap_or(&[])
        }

        pub fn date_format(&self) -> &'a str {
            self.pick(|s| s.date_format.as_deref())
                .unwrap_or(DEFAULT_DATE_FORMAT)
        }

        pub fn time_format(&self) -> &'a str {
            self.pick(|s| s.time_format.as_deref())
                .unwrap_or(DEFAULT_TIME_FORMAT)
        }

        pub fn done_char(&self) -> char {
            self.pick(|s| s.done_char).unwrap_or(DEFAULT_DONE_CHAR)
        }
    }

    /// Localized fixed tokens of the document format.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Locale {
        pub archive: String,
        pub complete: String,
    }

    impl Default for Locale {
        fn default() -> Self {
            Self {
                archive: "Archive".to_string(),
                complete: "Complete".to_string(),
            }
        }
    }

    impl Locale {
        /// The paragraph that flags a lane as "mark items complete".
        pub fn complete_marker(&self) -> String {
            format!("**{}**", self.complete)
        }

        pub fn is_complete_marker(&self, paragraph: &str) -> bool {
            let text = paragraph.trim();
            let inner = text
                .strip_prefix("**")
                .and_then(|t| t.strip_suffix("**"))
                .or_else(|| text.strip_prefix("__").and_then(|t| t.strip_suffix("__")))
                .unwrap_or(text);
            inner.trim() == self.complete
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn local_settings_shadow_global_ones() {
            let local: BoardSettings =
                serde_json::from_value(json!({"move-tags": true})).expect("local");
            let global: BoardSettings =
                serde_json::from_value(json!({"move-tags": false, "move-dates": true}))
                    .expect("global");
            let lookup = SettingsLookup::new(&local, Some(&global));
            assert!(lookup.move_tags());
            assert!(lookup.move_dates());
            assert!(!lookup.move_task_metadata());
            assert_eq!(lookup.get(SettingKey::MoveDates), Some(json!(true)));
            assert_eq!(lookup.date_format(), DEFAULT_DATE_FORMAT);
        }

        #[test]
        fn unknown_and_malformed_keys_survive_a_round_trip() {
            let input = r#"{"kanban-plugin":"basic","lane-width":"wide","custom":[1,2]}"#;
            let settings: BoardSettings = serde_json::from_str(input).expect("settings");
            assert_eq!(settings.kanban_plugin.as_deref(), Some("basic"));
            assert_eq!(settings.lane_width, None);
            assert_eq!(settings.extra.get("lane-width"), Some(&json!("wide")));

            let encoded = serde_json::to_string(&settings).expect("encode");
            assert_eq!(encoded, input);
        }

        #[test]
        fn complete_marker_accepts_bold_and_plain_forms() {
            let locale = Locale::default();
            assert!(locale.is_complete_marker("**Complete**"));
            assert!(locale.is_complete_marker("Complete"));
            assert!(!locale.is_complete_marker("**Completed**"));
        }
    }
}

pub mod syntax {
    //! Minimal markdown AST producer built on `nom`.
    //!
    //! Only the constructs a board document uses are recognised: ATX headings, paragraphs,
    //! bullet/ordered lists with task checkboxes, fenced code, thematic breaks, and the inline
    //! forms wikilink, embed, image, link, inline code, hashtag, `@{date}`, `@[[date]]`,
    //! `@@{time}` and `^blockid`. Every node carries its byte range in the source text.
    //!
    //! Parsing strategy:
    //! - The source is split into lines with absolute offsets; containers (list items) narrow
    //!   each line's start instead of copying text, so ranges always point into the source.
    //! - Line classification (heading, fence, rule, list marker, checkbox) uses `nom`.
    //! - Inline parsing runs over the contiguous source slice of a paragraph or heading.

    use crate::core::{BoardError, SourceRange};
    use nom::{
        IResult,
        branch::alt,
        bytes::complete::{tag, take_until, take_while, take_while1, take_while_m_n},
        character::complete::{anychar, char, digit1, one_of, space0, space1},
        combinator::{eof, map, peek, verify},
        error::VerboseError,
        sequence::{delimited, pair, preceded, terminated, tuple},
    };
    use std::convert::Infallible;

    /// Nested containers deeper than this are rejected instead of recursing further.
    pub const MAX_NESTING: usize = 32;

    type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

    /* ------------------------------- Nodes ------------------------------- */

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum NodeKind {
        Root,
        Heading { depth: u8 },
        Paragraph,
        List { ordered: bool },
        /// `checkbox` is the character between the brackets of a task item.
        ListItem { checkbox: Option<char> },
        Text { value: String },
        Wikilink { target: String, alias: Option<String> },
        EmbedWikilink { target: String },
        Image { alt: String, url: String },
        InlineCode { value: String },
        Code { lang: Option<String>, value: String },
        Hashtag { value: String },
        Date { date: String },
        DateLink { date: String },
        Time { time: String },
        BlockId { value: String },
        Link { url: String },
        EmbedLink { alt: String, url: String },
        ThematicBreak,
    }

    /// Payload-free discriminant of `NodeKind`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum NodeType {
        Root,
        Heading,
        Paragraph,
        List,
        ListItem,
        Text,
        Wikilink,
        EmbedWikilink,
        Image,
        InlineCode,
        Code,
        Hashtag,
        Date,
        DateLink,
        Time,
        BlockId,
        Link,
        EmbedLink,
        ThematicBreak,
    }

    impl NodeKind {
        pub fn node_type(&self) -> NodeType {
            match self {
                NodeKind::Root => NodeType::Root,
                NodeKind::Heading { .. } => NodeType::Heading,
                NodeKind::Paragraph => NodeType::Paragraph,
                NodeKind::List { .. } => NodeType::List,
                NodeKind::ListItem { .. } => NodeType::ListItem,
                NodeKind::Text { .. } => NodeType::Text,
                NodeKind::Wikilink { .. } => NodeType::Wikilink,
                NodeKind::EmbedWikilink { .. } => NodeType::EmbedWikilink,
                NodeKind::Image { .. } => NodeType::Image,
                NodeKind::InlineCode { .. } => NodeType::InlineCode,
                NodeKind::Code { .. } => NodeType::Code,
                NodeKind::Hashtag { .. } => NodeType::Hashtag,
                NodeKind::Date { .. } => NodeType::Date,
                NodeKind::DateLink { .. } => NodeType::DateLink,
                NodeKind::Time { .. } => NodeType::Time,
                NodeKind::BlockId { .. } => NodeType::BlockId,
                NodeKind::Link { .. } => NodeType::Link,
                NodeKind::EmbedLink { .. } => NodeType::EmbedLink,
                NodeKind::ThematicBreak => NodeType::ThematicBreak,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Node {
        pub kind: NodeKind,
        pub range: SourceRange,
        pub children: Vec<Node>,
    }

    impl Node {
        pub fn leaf(kind: NodeKind, range: SourceRange) -> Self {
            Self {
                kind,
                range,
                children: vec![],
            }
        }

        pub fn node_type(&self) -> NodeType {
            self.kind.node_type()
        }

        pub fn is(&self, wanted: NodeType) -> bool {
            self.node_type() == wanted
        }
    }

    /* ----------------------------- Traversal ----------------------------- */

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Visit {
        Continue,
        /// Do not descend into the current node.
        Skip,
    }

    /// Pre-order walk that can abort with an error.
    pub fn try_visit<'a, E, F>(node: &'a Node, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&'a Node) -> Result<Visit, E>,
    {
        match f(node)? {
            Visit::Skip => Ok(()),
            Visit::Continue => {
                for child in &node.children {
                    try_visit(child, f)?;
                }
                Ok(())
            }
        }
    }

    pub fn visit<'a, F>(node: &'a Node, f: &mut F)
    where
        F: FnMut(&'a Node) -> Visit,
    {
        let outcome: Result<(), Infallible> = try_visit(node, &mut |n| Ok(f(n)));
        if let Err(never) = outcome {
            match never {}
        }
    }

    /* -------------------------- Boundary helpers -------------------------- */

    /// Range of a node's content, without its structural markup.
    pub fn content_boundary(node: &Node) -> SourceRange {
        match (node.children.first(), node.children.last()) {
            (Some(first), Some(last)) => SourceRange::new(first.range.start, last.range.end),
            _ => match node.kind {
                // An empty heading has no content after its marker run.
                NodeKind::Heading { .. } => SourceRange::new(node.range.end, node.range.end),
                _ => node.range,
            },
        }
    }

    pub fn extract<'a>(source: &'a str, boundary: SourceRange) -> &'a str {
        boundary.slice(source)
    }

    /// First sibling after `from` of the wanted type. Gives up as soon as `keep_going`
    /// rejects an intermediate sibling.
    pub fn first_next_of_type<'a, F>(
        siblings: &'a [Node],
        from: usize,
        wanted: NodeType,
        mut keep_going: F,
    ) -> Option<(usize, &'a Node)>
    where
        F: FnMut(&Node) -> bool,
    {
        for (index, node) in siblings.iter().enumerate().skip(from + 1) {
            if node.is(wanted) {
                return Some((index, node));
            }
            if !keep_going(node) {
                return None;
            }
        }
        None
    }

    /* ------------------------ Public entry points ------------------------ */

    pub fn parse_markdown(source: &str) -> Result<Node, BoardError> {
        parse_markdown_from(source, 0)
    }

    /// Parses `source[offset..]`; node ranges stay absolute.
    pub fn parse_markdown_from(source: &str, offset: usize) -> Result<Node, BoardError> {
        if offset > source.len() || !source.is_char_boundary(offset) {
            return Err(BoardError::DocumentParse {
                stage: "markdown",
                message: format!("body offset {offset} is not a character boundary"),
            });
        }
        let lines = split_lines(source, offset);
        let children = parse_blocks(source, &lines, 0)?;
        Ok(Node {
            kind: NodeKind::Root,
            range: SourceRange::new(offset, source.len()),
            children,
        })
    }

    /* ------------------------------- Lines ------------------------------- */

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Line {
        start: usize,
        /// Excludes the line terminator.
        end: usize,
    }

    impl Line {
        fn text<'a>(&self, source: &'a str) -> &'a str {
            &source[self.start..self.end]
        }

        fn is_blank(&self, source: &str) -> bool {
            self.text(source).trim().is_empty()
        }

        /// Drops up to `columns` of indentation; tabs count as four columns.
        fn dedent(&self, source: &str, columns: usize) -> Line {
            let text = self.text(source);
            let mut used = 0;
            let mut bytes = 0;
            for c in text.chars() {
                if used >= columns {
                    break;
                }
                match c {
                    ' ' => used += 1,
                    '\t' => used += 4,
                    _ => break,
                }
                bytes += 1;
            }
            Line {
                start: self.start + bytes,
                end: self.end,
            }
        }
    }

    fn split_lines(source: &str, offset: usize) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut start = offset;
        for chunk in source[offset..].split_inclusive('\n') {
            let body = chunk
                .strip_suffix('\n')
                .map(|b| b.strip_suffix('\r').unwrap_or(b))
                .unwrap_or(chunk);
            lines.push(Line {
                start,
                end: start + body.len(),
            });
            start += chunk.len();
        }
        lines
    }

    fn indent_columns(text: &str) -> usize {
        text.chars()
            .take_while(|c: &char| *c == ' ' || *c == '\t')
            .map(|c: char| if c == '\t' { 4 } else { 1 })
            .sum()
    }

    fn trimmed(source: &str, line: Line) -> SourceRange {
        let text = line.text(source);
        let lead = text.len() - text.trim_start().len();
        let body = text.trim();
        SourceRange::new(line.start + lead, line.start + lead + body.len())
    }

    /* ------------------------- Line classification ------------------------- */

    fn up_to_three_spaces(i: &str) -> PResult<'_, &str> {
        take_while_m_n(0, 3, |c: char| c == ' ')(i)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Fence {
        marker: char,
        len: usize,
    }

    fn fence_open(i: &str) -> PResult<'_, (Fence, &str)> {
        let (i, _) = up_to_three_spaces(i)?;
        let (i, run) = alt((
            verify(take_while1(|c: char| c == '`'), |s: &str| s.len() >= 3),
            verify(take_while1(|c: char| c == '~'), |s: &str| s.len() >= 3),
        ))(i)?;
        let marker = if run.starts_with('`') { '`' } else { '~' };
        Ok((
            "",
            (
                Fence {
                    marker,
                    len: run.len(),
                },
                i.trim(),
            ),
        ))
    }

    fn fence_close(fence: Fence) -> impl Fn(&str) -> PResult<'_, ()> {
        move |i| {
            let (i, _) = up_to_three_spaces(i)?;
            let (i, _) = verify(take_while1(move |c: char| c == fence.marker), |s: &str| {
                s.len() >= fence.len
            })(i)?;
            let (i, _) = space0(i)?;
            let (i, _) = eof(i)?;
            Ok((i, ()))
        }
    }

    /// `(depth, content start, content end)` with offsets relative to the line text.
    fn atx_heading(line: &str) -> PResult<'_, (u8, usize, usize)> {
        let (i, _) = up_to_three_spaces(line)?;
        let (i, hashes) = take_while_m_n(1, 6, |c: char| c == '#')(i)?;
        let (i, _) = alt((space1, eof))(i)?;
        let start = line.len() - i.len();
        let body = i.trim_end();
        let mut end = start + body.len();
        let without_closing = body.trim_end_matches('#');
        if without_closing.is_empty() {
            end = start;
        } else if without_closing.ends_with([' ', '\t']) {
            end = start + without_closing.trim_end().len();
        }
        let lead = body.len() - body.trim_start().len();
        Ok(("", (hashes.len() as u8, (start + lead).min(end), end)))
    }

    fn is_thematic_break(line: &str) -> bool {
        let body = line.trim();
        if indent_columns(line) > 3 {
            return false;
        }
        let Some(marker) = body.chars().next() else {
            return false;
        };
        if !matches!(marker, '*' | '-' | '_') {
            return false;
        }
        body.chars().all(|c: char| c == marker || c == ' ' || c == '\t')
            && body.chars().filter(|c: &char| *c == marker).count() >= 3
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Bullet {
        Unordered(char),
        Ordered { delimiter: char, start: u64 },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct ListMarker {
        bullet: Bullet,
        /// Bytes from the line start to the first content byte.
        content_offset: usize,
        empty: bool,
    }

    impl ListMarker {
        fn same_list(&self, other: &ListMarker) -> bool {
            match (self.bullet, other.bullet) {
                (Bullet::Unordered(a), Bullet::Unordered(b)) => a == b,
                (Bullet::Ordered { delimiter: a, .. }, Bullet::Ordered { delimiter: b, .. }) => {
                    a == b
                }
                _ => false,
            }
        }

        fn can_interrupt_paragraph(&self) -> bool {
            match self.bullet {
                Bullet::Unordered(_) => !self.empty,
                Bullet::Ordered { start, .. } => start == 1 && !self.empty,
            }
        }
    }

    fn list_marker(line: &str) -> PResult<'_, ListMarker> {
        let (i, _) = up_to_three_spaces(line)?;
        let (i, bullet) = alt((
            map(one_of("-*+"), Bullet::Unordered),
            map(
                pair(
                    verify(digit1, |d: &str| d.len() <= 9),
                    one_of(".)"),
                ),
                |(digits, delimiter): (&str, char)| Bullet::Ordered {
                    delimiter,
                    start: digits.parse().unwrap_or(0),
                },
            ),
        ))(i)?;
        let marker_end = line.len() - i.len();
        let (rest, gap) = alt((space1, eof))(i)?;
        let empty = rest.trim().is_empty();
        let gap_columns = indent_columns(gap);
        let content_offset = if empty || gap_columns > 4 {
            (marker_end + 1).min(line.len())
        } else {
            marker_end + gap.len()
        };
        Ok((
            rest,
            ListMarker {
                bullet,
                content_offset,
                empty,
            },
        ))
    }

    fn item_marker(line: &str) -> Option<ListMarker> {
        if is_thematic_break(line) {
            return None;
        }
        list_marker(line).ok().map(|(_, marker)| marker)
    }

    /// `[c]` followed by whitespace and some text. Returns the bracketed character.
    fn checkbox(i: &str) -> PResult<'_, char> {
        let (i, c) = delimited(
            char('['),
            verify(anychar, |c: &char| *c != ']' && *c != '\n' && *c != '\r'),
            char(']'),
        )(i)?;
        let (i, _) = space1(i)?;
        let (i, _) = peek(verify(anychar, |c: &char| !c.is_whitespace()))(i)?;
        Ok((i, c))
    }

    fn interrupts_paragraph(line: &str) -> bool {
        fence_open(line).is_ok()
            || atx_heading(line).is_ok()
            || is_thematic_break(line)
            || item_marker(line).is_some_and(|m| m.can_interrupt_paragraph())
    }

    /* ------------------------------- Blocks ------------------------------- */

    fn too_deep(depth: usize) -> BoardError {
        log::debug!("rejecting document at nesting depth {depth}");
        BoardError::DocumentParse {
            stage: "markdown",
            message: format!("containers nested deeper than {MAX_NESTING} levels"),
        }
    }

    fn parse_blocks(source: &str, lines: &[Line], depth: usize) -> Result<Vec<Node>, BoardError> {
        if depth > MAX_NESTING {
            return Err(too_deep(depth));
        }
        let mut out = Vec::new();
        let mut index = 0;
        while index < lines.len() {
            let line = lines[index];
            let text = line.text(source);
            if line.is_blank(source) {
                index += 1;
                continue;
            }
            if let Ok((_, (fence, info))) = fence_open(text) {
                let (node, next) = parse_fenced_code(source, lines, index, fence, info);
                out.push(node);
                index = next;
                continue;
            }
            if let Ok((_, (level, start, end))) = atx_heading(text) {
                out.push(heading_node(source, line, level, start, end));
                index += 1;
                continue;
            }
            if is_thematic_break(text) {
                out.push(Node::leaf(NodeKind::ThematicBreak, trimmed(source, line)));
                index += 1;
                continue;
            }
            if let Some(marker) = item_marker(text) {
                let (node, next) = parse_list(source, lines, index, marker, depth)?;
                out.push(node);
                index = next;
                continue;
            }

            let mut end = index + 1;
            while end < lines.len() {
                let next = lines[end];
                if next.is_blank(source) || interrupts_paragraph(next.text(source)) {
                    break;
                }
                end += 1;
            }
            out.push(paragraph_node(source, &lines[index..end]));
            index = end;
        }
        Ok(out)
    }

    fn parse_fenced_code(
        source: &str,
        lines: &[Line],
        open: usize,
        fence: Fence,
        info: &str,
    ) -> (Node, usize) {
        let closing = lines[open + 1..]
            .iter()
            .position(|line| fence_close(fence)(line.text(source)).is_ok())
            .map(|pos| open + 1 + pos);
        let body_end = closing.unwrap_or(lines.len());
        let inner = &lines[open + 1..body_end];
        let value = match (inner.first(), inner.last()) {
            (Some(first), Some(last)) => source[first.start..last.end].to_string(),
            _ => String::new(),
        };
        let last_line = closing.map(|c| lines[c]).unwrap_or(lines[body_end - 1]);
        let lang = info
            .split_whitespace()
            .next()
            .map(|word| word.to_string());
        let start = trimmed(source, lines[open]).start;
        let node = Node::leaf(
            NodeKind::Code { lang, value },
            SourceRange::new(start, last_line.end),
        );
        (node, closing.map(|c| c + 1).unwrap_or(lines.len()))
    }

    fn heading_node(source: &str, line: Line, depth: u8, start: usize, end: usize) -> Node {
        let content = SourceRange::new(line.start + start, line.start + end);
        Node {
            kind: NodeKind::Heading { depth },
            range: trimmed(source, line),
            children: parse_inlines(source, content),
        }
    }

    fn paragraph_node(source: &str, lines: &[Line]) -> Node {
        let start = lines
            .first()
            .map(|l| trimmed(source, *l).start)
            .unwrap_or_default();
        let end = lines
            .last()
            .map(|l| trimmed(source, *l).end)
            .unwrap_or(start);
        let range = SourceRange::new(start, end.max(start));
        Node {
            kind: NodeKind::Paragraph,
            range,
            children: parse_inlines(source, range),
        }
    }

    fn parse_list(
        source: &str,
        lines: &[Line],
        first: usize,
        marker: ListMarker,
        depth: usize,
    ) -> Result<(Node, usize), BoardError> {
        let mut items = Vec::new();
        let mut index = first;
        let mut current = marker;
        loop {
            let (item, next) = parse_list_item(source, lines, index, current, depth)?;
            items.push(item);
            index = next;

            let mut peek = index;
            while peek < lines.len() && lines[peek].is_blank(source) {
                peek += 1;
            }
            match lines
                .get(peek)
                .and_then(|line| item_marker(line.text(source)))
            {
                Some(next_marker) if next_marker.same_list(&marker) => {
                    current = next_marker;
                    index = peek;
                }
                _ => break,
            }
        }

        let start = items.first().map(|n| n.range.start).unwrap_or_default();
        let end = items.last().map(|n| n.range.end).unwrap_or(start);
        let ordered = matches!(marker.bullet, Bullet::Ordered { .. });
        Ok((
            Node {
                kind: NodeKind::List { ordered },
                range: SourceRange::new(start, end),
                children: items,
            },
            index,
        ))
    }

    fn parse_list_item(
        source: &str,
        lines: &[Line],
        first: usize,
        marker: ListMarker,
        depth: usize,
    ) -> Result<(Node, usize), BoardError> {
        let head = lines[first];
        let head_text = head.text(source);
        let item_start = trimmed(source, head).start;
        let content_columns = indent_columns(&head_text[..marker.content_offset])
            + head_text[..marker.content_offset]
                .trim_start()
                .chars()
                .count();

        let mut first_line = Line {
            start: head.start + marker.content_offset,
            end: head.end,
        };
        let mut checked = None;
        if let Ok((rest, c)) = checkbox(first_line.text(source)) {
            checked = Some(c);
            first_line.start = first_line.end - rest.len();
        }

        let mut item_lines = vec![first_line];
        let mut last_content = first;
        let mut lazy_ok = !marker.empty;
        let mut index = first + 1;
        while index < lines.len() {
            let line = lines[index];
            if line.is_blank(source) {
                lazy_ok = false;
                index += 1;
                continue;
            }
            let text = line.text(source);
            if indent_columns(text) >= content_columns {
                for blank in &lines[last_content + 1..index] {
                    item_lines.push(blank.dedent(source, content_columns));
                }
                item_lines.push(line.dedent(source, content_columns));
                last_content = index;
                lazy_ok = true;
                index += 1;
                continue;
            }
            if lazy_ok && index == last_content + 1 && !interrupts_paragraph(text) {
                if item_marker(text).is_some() {
                    break;
                }
                item_lines.push(line.dedent(source, usize::MAX));
                last_content = index;
                index += 1;
                continue;
            }
            break;
        }

        let children = parse_blocks(source, &item_lines, depth + 1)?;
        let end = children
            .last()
            .map(|c| c.range.end)
            .unwrap_or_else(|| trimmed(source, head).end);
        Ok((
            Node {
                kind: NodeKind::ListItem { checkbox: checked },
                range: SourceRange::new(item_start, end.max(item_start)),
                children,
            },
            last_content + 1,
        ))
    }

    /* --------------------------- Inline markup --------------------------- */

    const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "bmp", "svg", "webp", "avif"];

    fn is_tag_char(c: char) -> bool {
        c.is_alphanumeric() || matches!(c, '_' | '-' | '/')
    }

    fn bracket_body(i: &str) -> PResult<'_, &str> {
        take_while(|c: char| c != ']' && c != '\n')(i)
    }

    fn wikilink_body(i: &str) -> PResult<'_, &str> {
        delimited(tag("[["), bracket_body, tag("]]"))(i)
    }

    fn split_alias(body: &str) -> (String, Option<String>) {
        match body.split_once('|') {
            Some((target, alias)) => (target.trim().to_string(), Some(alias.trim().to_string())),
            None => (body.trim().to_string(), None),
        }
    }

    fn inline_code(i: &str) -> PResult<'_, NodeKind> {
        let (rest, ticks) = take_while1(|c: char| c == '`')(i)?;
        let (rest, body) = terminated(take_until(ticks), tag(ticks))(rest)?;
        Ok((
            rest,
            NodeKind::InlineCode {
                value: body.trim().to_string(),
            },
        ))
    }

    fn embed_wikilink(i: &str) -> PResult<'_, NodeKind> {
        map(preceded(char('!'), wikilink_body), |body| {
            NodeKind::EmbedWikilink {
                target: split_alias(body).0,
            }
        })(i)
    }

    fn wikilink(i: &str) -> PResult<'_, NodeKind> {
        map(wikilink_body, |body| {
            let (target, alias) = split_alias(body);
            NodeKind::Wikilink { target, alias }
        })(i)
    }

    fn date_link(i: &str) -> PResult<'_, NodeKind> {
        map(preceded(char('@'), wikilink_body), |body| NodeKind::DateLink {
            date: split_alias(body).0,
        })(i)
    }

    fn braced(i: &str) -> PResult<'_, &str> {
        delimited(
            char('{'),
            take_while1(|c: char| c != '}' && c != '\n'),
            char('}'),
        )(i)
    }

    fn time(i: &str) -> PResult<'_, NodeKind> {
        map(preceded(tag("@@"), braced), |t: &str| NodeKind::Time {
            time: t.trim().to_string(),
        })(i)
    }

    fn date(i: &str) -> PResult<'_, NodeKind> {
        map(preceded(char('@'), braced), |d: &str| NodeKind::Date {
            date: d.trim().to_string(),
        })(i)
    }

    fn link_target(i: &str) -> PResult<'_, &str> {
        delimited(
            char('('),
            take_while1(|c: char| c != ')' && c != '\n'),
            char(')'),
        )(i)
    }

    fn image_or_embed(i: &str) -> PResult<'_, NodeKind> {
        let (rest, (alt_text, url)) = preceded(
            tag("!["),
            tuple((terminated(bracket_body, char(']')), link_target)),
        )(i)?;
        let url = url.trim().to_string();
        let extension = url
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let alt = alt_text.to_string();
        let kind = if IMAGE_EXTENSIONS.contains(&extension.as_str()) || url.contains("://") {
            NodeKind::Image { alt, url }
        } else {
            NodeKind::EmbedLink { alt, url }
        };
        Ok((rest, kind))
    }

    /// `[label](url)`; also returns the label so it can become a child text node.
    fn link(i: &str) -> PResult<'_, (NodeKind, &str)> {
        let (rest, (label, url)) = tuple((
            delimited(char('['), bracket_body, char(']')),
            link_target,
        ))(i)?;
        Ok((
            rest,
            (
                NodeKind::Link {
                    url: url.trim().to_string(),
                },
                label,
            ),
        ))
    }

    fn hashtag(i: &str) -> PResult<'_, NodeKind> {
        map(
            preceded(
                char('#'),
                verify(take_while1(is_tag_char), |t: &str| {
                    !t.chars().all(|c: char| c.is_ascii_digit())
                }),
            ),
            |t: &str| NodeKind::Hashtag {
                value: t.to_string(),
            },
        )(i)
    }

    /// `^id` only counts at the very end of the inline run.
    fn block_id(i: &str) -> PResult<'_, NodeKind> {
        let (rest, id) = preceded(
            char('^'),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-'),
        )(i)?;
        let _ = terminated(take_while(char::is_whitespace), eof)(rest)?;
        Ok((
            rest,
            NodeKind::BlockId {
                value: id.to_string(),
            },
        ))
    }

    type Atom = (usize, NodeKind, Option<SourceRange>);

    fn leaf(i: &str, result: PResult<'_, NodeKind>) -> Option<Atom> {
        result
            .ok()
            .map(|(rest, kind)| (i.len() - rest.len(), kind, None))
    }

    /// One inline construct at the head of `i`: consumed bytes, kind, and the label range
    /// relative to `i` for links.
    fn inline_atom(i: &str, previous: Option<char>) -> Option<Atom> {
        let after_space = previous.is_none_or(|c: char| c.is_whitespace() || c == '(');
        match i.chars().next()? {
            '`' => leaf(i, inline_code(i)),
            '!' => leaf(i, alt((embed_wikilink, image_or_embed))(i)),
            '[' => leaf(i, wikilink(i)).or_else(|| {
                link(i).ok().map(|(rest, (kind, label))| {
                    let label_range =
                        (!label.is_empty()).then(|| SourceRange::new(1, 1 + label.len()));
                    (i.len() - rest.len(), kind, label_range)
                })
            }),
            '@' => leaf(i, alt((date_link, time, date))(i)),
            '#' if after_space => leaf(i, hashtag(i)),
            '^' if after_space => leaf(i, block_id(i)),
            _ => None,
        }
    }

    /// Inline nodes covering `range` completely; gaps become text nodes.
    pub fn parse_inlines(source: &str, range: SourceRange) -> Vec<Node> {
        let text = range.slice(source);
        let base = range.start;
        let mut out = Vec::new();
        let mut pos = 0;
        let mut text_start = 0;

        let flush = |out: &mut Vec<Node>, from: usize, to: usize| {
            if to > from {
                out.push(Node::leaf(
                    NodeKind::Text {
                        value: text[from..to].to_string(),
                    },
                    SourceRange::new(base + from, base + to),
                ));
            }
        };

        while pos < text.len() {
            let previous = text[..pos].chars().next_back();
            if let Some((len, kind, label)) = inline_atom(&text[pos..], previous) {
                flush(&mut out, text_start, pos);
                let range = SourceRange::new(base + pos, base + pos + len);
                let children = label
                    .map(|l| {
                        let abs = SourceRange::new(range.start + l.start, range.start + l.end);
                        vec![Node::leaf(
                            NodeKind::Text {
                                value: abs.slice(source).to_string(),
                            },
                            abs,
                        )]
                    })
                    .unwrap_or_default();
                out.push(Node {
                    kind,
                    range,
                    children,
                });
                pos += len;
                text_start = pos;
                continue;
            }
            match text[pos..].chars().next() {
                Some(c) => pos += c.len_utf8(),
                None => break,
            }
        }
        flush(&mut out, text_start, text.len());
        out
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn kinds(nodes: &[Node]) -> Vec<NodeType> {
            nodes.iter().map(Node::node_type).collect()
        }

        #[test]
        fn headings_lists_and_rules_become_top_level_blocks() {
            let src = "## Todo\n\n- [ ] one\n- [x] two\n\n***\n\n## Archive\n";
            let root = parse_markdown(src).expect("parse");
            assert_eq!(
                kinds(&root.children),
                vec![
                    NodeType::Heading,
                    NodeType::List,
                    NodeType::ThematicBreak,
                    NodeType::Heading
                ]
            );
            let list = &root.children[1];
            assert_eq!(list.children.len(), 2);
            assert_eq!(
                list.children[1].kind,
                NodeKind::ListItem {
                    checkbox: Some('x')
                }
            );
            let para = &list.children[0].children[0];
            assert_eq!(extract(src, content_boundary(para)), "one");
        }

        #[test]
        fn heading_boundary_excludes_markers() {
            let src = "###   Doing (3) ##\n";
            let root = parse_markdown(src).expect("parse");
            let heading = &root.children[0];
            assert_eq!(heading.kind, NodeKind::Heading { depth: 3 });
            assert_eq!(extract(src, content_boundary(heading)), "Doing (3)");
        }

        #[test]
        fn list_item_keeps_indented_continuation_and_nested_list() {
            let src = "- [ ] parent\n    more text\n    - [ ] child\n- [ ] sibling\n";
            let root = parse_markdown(src).expect("parse");
            let list = &root.children[0];
            assert_eq!(list.children.len(), 2);
            let parent = &list.children[0];
            assert_eq!(kinds(&parent.children), vec![NodeType::Paragraph, NodeType::List]);
            assert_eq!(
                extract(src, content_boundary(&parent.children[0])),
                "parent\n    more text"
            );
        }

        #[test]
        fn bare_checkbox_is_plain_paragraph_text() {
            let src = "- [ ]\n";
            let root = parse_markdown(src).expect("parse");
            let item = &root.children[0].children[0];
            assert_eq!(item.kind, NodeKind::ListItem { checkbox: None });
            assert_eq!(extract(src, content_boundary(&item.children[0])), "[ ]");
        }

        #[test]
        fn inline_constructs_are_recognised() {
            let src = "a #tag @{2024-01-01} @@{09:30} [[Note|n]] ![[pic.png]] `#no` ^abc-1";
            let root = parse_markdown(src).expect("parse");
            let para = &root.children[0];
            let types: Vec<NodeType> = kinds(&para.children)
                .into_iter()
                .filter(|t| *t != NodeType::Text)
                .collect();
            assert_eq!(
                types,
                vec![
                    NodeType::Hashtag,
                    NodeType::Date,
                    NodeType::Time,
                    NodeType::Wikilink,
                    NodeType::EmbedWikilink,
                    NodeType::InlineCode,
                    NodeType::BlockId
                ]
            );
            let block = para.children.last().expect("block id");
            assert_eq!(extract(src, block.range), "^abc-1");
        }

        #[test]
        fn hashtag_needs_leading_space_and_a_letter() {
            let src = "issue#12 and #12 but #x12";
            let root = parse_markdown(src).expect("parse");
            let tags: Vec<&NodeKind> = root.children[0]
                .children
                .iter()
                .filter(|n| n.is(NodeType::Hashtag))
                .map(|n| &n.kind)
                .collect();
            assert_eq!(
                tags,
                vec![&NodeKind::Hashtag {
                    value: "x12".into()
                }]
            );
        }

        #[test]
        fn fenced_code_hides_its_body() {
            let src = "%% kanban:settings\n```\n{\"a\":1}\n```\n%%";
            let root = parse_markdown(src).expect("parse");
            assert_eq!(
                kinds(&root.children),
                vec![NodeType::Paragraph, NodeType::Code, NodeType::Paragraph]
            );
            match &root.children[1].kind {
                NodeKind::Code { value, .. } => assert_eq!(value, "{\"a\":1}"),
                other => panic!("expected code, got {:?}", other),
            }
        }

        #[test]
        fn first_next_of_type_stops_at_rejected_sibling() {
            let src = "## A\n\nintro\n\n## B\n\n- [ ] x\n";
            let root = parse_markdown(src).expect("parse");
            let stop_at_heading = |n: &Node| !n.is(NodeType::Heading);
            assert!(first_next_of_type(&root.children, 0, NodeType::List, stop_at_heading).is_none());
            let (index, _) = first_next_of_type(&root.children, 2, NodeType::List, stop_at_heading)
                .expect("list after B");
            assert_eq!(index, 3);
        }

        #[test]
        fn excessive_nesting_is_a_document_error() {
            let mut src = String::new();
            for depth in 0..(MAX_NESTING + 3) {
                src.push_str(&"  ".repeat(depth));
                src.push_str("- x\n");
            }
            assert!(matches!(
                parse_markdown(&src),
                Err(BoardError::DocumentParse { .. })
            ));
        }
    }
}

pub mod fields {
    //! Inline key/value annotations inside item text.
    //!
    //! Recognised forms, in priority order when they overlap:
    //! - `[key:: value]` and `(key:: value)`, brackets may nest
    //! - `@key(value)` (lenient grammar only)
    //! - task emoji shorthands such as `📅 2024-01-01` (lenient grammar only)
    //! - a whole line `key:: value`, when that line carries no other field
    //!
    //! Text inside fenced code and backtick spans is never scanned.

    use crate::core::{FieldKind, InlineField, SourceRange};
    use once_cell::sync::Lazy;
    use regex::Regex;

    /// Keys owned by task scheduling. Matched case-insensitively.
    pub const TASK_FIELDS: [&str; 11] = [
        "created",
        "start",
        "scheduled",
        "due",
        "completion",
        "cancelled",
        "priority",
        "recurrence",
        "onCompletion",
        "dependsOn",
        "id",
    ];

    pub fn is_task_field(key: &str) -> bool {
        let key = key.trim();
        TASK_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(key))
    }

    pub fn field_kind(key: &str) -> FieldKind {
        if is_task_field(key) {
            FieldKind::Task
        } else {
            FieldKind::User
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FieldGrammar {
        /// ASCII keys, bracketed and full-line forms only.
        Strict,
        /// Unicode keys with spaces, plus `@key(value)` and emoji shorthands.
        Lenient,
    }

    static STRICT_BODY: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^\s*([A-Za-z0-9_][A-Za-z0-9_-]*)\s*::\s*(.*?)\s*$").expect("valid regex")
    });
    static LENIENT_BODY: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^\s*([\p{L}\p{N}_][\p{L}\p{N}_ /-]*?)\s*::\s*(.*?)\s*$")
            .expect("valid regex")
    });
    static AT_FIELD: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?:^|\s)@([\p{L}\p{N}_][\p{L}\p{N}_-]*)\(([^()\n]*)\)").expect("valid regex")
    });
    static EMOJI_DATE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(📅|⏳|🛫|➕|✅|❌)\x{FE0F}? *(\d{4}-\d{2}-\d{2})").expect("valid regex")
    });
    static EMOJI_RECURRENCE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"🔁\x{FE0F}? *([a-zA-Z0-9, !]*[a-zA-Z0-9!])").expect("valid regex")
    });
    static EMOJI_ON_COMPLETION: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"🏁\x{FE0F}? *([a-zA-Z]+)").expect("valid regex"));
    static EMOJI_DEPENDS_ON: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"⛔\x{FE0F}? *([a-zA-Z0-9_-]+(?: *, *[a-zA-Z0-9_-]+)*)").expect("valid regex")
    });
    static EMOJI_ID: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"🆔\x{FE0F}? *([a-zA-Z0-9_-]+)").expect("valid regex"));
    static EMOJI_PRIORITY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(🔺|⏫|🔼|🔽|⏬)\x{FE0F}?").expect("valid regex"));

    fn body_regex(grammar: FieldGrammar) -> &'static Regex {
        match grammar {
            FieldGrammar::Strict => &STRICT_BODY,
            FieldGrammar::Lenient => &LENIENT_BODY,
        }
    }

    fn date_emoji_key(emoji: &str) -> &'static str {
        match emoji {
            "📅" => "due",
            "⏳" => "scheduled",
            "🛫" => "start",
            "➕" => "created",
            "✅" => "completion",
            _ => "cancelled",
        }
    }

    fn priority_name(emoji: &str) -> &'static str {
        match emoji {
            "🔺" => "highest",
            "⏫" => "high",
            "🔼" => "medium",
            "🔽" => "low",
            _ => "lowest",
        }
    }

    fn field(key: &str, value: &str, span: SourceRange) -> InlineField {
        InlineField {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
            span,
            kind: field_kind(key),
        }
    }

    /* ----------------------------- Code zones ----------------------------- */

    /// Byte ranges of fenced blocks and backtick spans.
    pub fn code_zones(text: &str) -> Vec<SourceRange> {
        let mut zones = Vec::new();
        let mut fence: Option<(usize, &str)> = None;
        let mut offset = 0;
        for chunk in text.split_inclusive('\n') {
            let line = chunk.trim_end_matches(['\n', '\r']);
            let trimmed = line.trim_start();
            let marker = if trimmed.starts_with("```") {
                Some("```")
            } else if trimmed.starts_with("~~~") {
                Some("~~~")
            } else {
                None
            };
            match (fence, marker) {
                (Some((start, open)), Some(m)) if m == open => {
                    zones.push(SourceRange::new(start, offset + line.len()));
                    fence = None;
                }
                (Some(_), _) => {}
                (None, Some(m)) => fence = Some((offset, m)),
                (None, None) => zones.extend(backtick_spans(line, offset)),
            }
            offset += chunk.len();
        }
        if let Some((start, _)) = fence {
            zones.push(SourceRange::new(start, text.len()));
        }
        zones
    }

    fn backtick_spans(line: &str, base: usize) -> Vec<SourceRange> {
        let mut spans = Vec::new();
        let bytes = line.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            if bytes[pos] != b'`' {
                pos += 1;
                continue;
            }
            let run = bytes[pos..].iter().take_while(|b| **b == b'`').count();
            let ticks = &line[pos..pos + run];
            match line[pos + run..].find(ticks) {
                Some(close) => {
                    let end = pos + run + close + run;
                    spans.push(SourceRange::new(base + pos, base + end));
                    pos = end;
                }
                None => pos += run,
            }
        }
        spans
    }

    /* ------------------------------ Scanning ------------------------------ */

    /// Closing bracket matching the one at `open`, on the same line.
    fn matching_close(text: &str, open: usize) -> Option<usize> {
        let bytes = text.as_bytes();
        let (opening, closing) = match bytes[open] {
            b'[' => (b'[', b']'),
            _ => (b'(', b')'),
        };
        let mut depth = 0usize;
        for (index, b) in bytes.iter().enumerate().skip(open) {
            match *b {
                b'\n' => return None,
                b if b == opening => depth += 1,
                b if b == closing => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(index);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn bracketed_fields(text: &str, grammar: FieldGrammar) -> Vec<InlineField> {
        let body = body_regex(grammar);
        let mut found = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            let b = text.as_bytes()[pos];
            if b == b'[' || b == b'(' {
                if let Some(close) = matching_close(text, pos) {
                    if let Some(caps) = body.captures(&text[pos + 1..close]) {
                        found.push(field(
                            &caps[1],
                            &caps[2],
                            SourceRange::new(pos, close + 1),
                        ));
                        pos = close + 1;
                        continue;
                    }
                }
            }
            pos += 1;
        }
        found
    }

    fn lenient_fields(text: &str) -> Vec<InlineField> {
        let mut found = Vec::new();
        for caps in AT_FIELD.captures_iter(text) {
            let (Some(key), Some(value), Some(all)) = (caps.get(1), caps.get(2), caps.get(0))
            else {
                continue;
            };
            found.push(field(
                key.as_str(),
                value.as_str(),
                SourceRange::new(key.start() - 1, all.end()),
            ));
        }
        for caps in EMOJI_DATE.captures_iter(text) {
            let (Some(all), Some(emoji), Some(value)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let key = date_emoji_key(emoji.as_str());
            found.push(field(
                key,
                value.as_str(),
                SourceRange::new(all.start(), all.end()),
            ));
        }
        let keyed: [(&Lazy<Regex>, &str); 4] = [
            (&EMOJI_RECURRENCE, "recurrence"),
            (&EMOJI_ON_COMPLETION, "onCompletion"),
            (&EMOJI_DEPENDS_ON, "dependsOn"),
            (&EMOJI_ID, "id"),
        ];
        for (regex, key) in keyed {
            for caps in regex.captures_iter(text) {
                let (Some(all), Some(value)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                found.push(field(
                    key,
                    value.as_str(),
                    SourceRange::new(all.start(), all.end()),
                ));
            }
        }
        for caps in EMOJI_PRIORITY.captures_iter(text) {
            let (Some(all), Some(emoji)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            found.push(field(
                "priority",
                priority_name(emoji.as_str()),
                SourceRange::new(all.start(), all.end()),
            ));
        }
        found
    }

    fn full_line_fields(
        text: &str,
        grammar: FieldGrammar,
        taken: &[InlineField],
        zones: &[SourceRange],
    ) -> Vec<InlineField> {
        let body = body_regex(grammar);
        let mut found = Vec::new();
        let mut offset = 0;
        for chunk in text.split_inclusive('\n') {
            let line = chunk.trim_end_matches(['\n', '\r']);
            let range = SourceRange::new(offset, offset + line.len());
            offset += chunk.len();
            let busy = taken.iter().any(|f| f.span.overlaps(&range))
                || zones.iter().any(|z| z.overlaps(&range));
            if busy || line.trim().is_empty() {
                continue;
            }
            if let Some(caps) = body.captures(line) {
                let lead = line.len() - line.trim_start().len();
                let span = SourceRange::new(range.start + lead, range.start + line.trim_end().len());
                found.push(field(&caps[1], &caps[2], span));
            }
        }
        found
    }

    /// All fields in `text`, sorted by position, never overlapping each other.
    pub fn extract_inline_fields(text: &str, grammar: FieldGrammar) -> Vec<InlineField> {
        let zones = code_zones(text);
        let outside_code =
            |f: &InlineField| !zones.iter().any(|zone| zone.overlaps(&f.span));

        let mut candidates = bracketed_fields(text, grammar);
        if grammar == FieldGrammar::Lenient {
            candidates.extend(lenient_fields(text));
        }
        candidates.retain(outside_code);
        // Stable sort keeps bracketed fields ahead of shorthands that start at the same byte.
        candidates.sort_by_key(|f| f.span.start);

        let mut accepted: Vec<InlineField> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if accepted.iter().all(|f| !f.span.overlaps(&candidate.span)) {
                accepted.push(candidate);
            }
        }

        let lines = full_line_fields(text, grammar, &accepted, &zones);
        accepted.extend(lines);
        accepted.sort_by_key(|f| f.span.start);
        accepted
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn keys(fields: &[InlineField]) -> Vec<(&str, &str)> {
            fields
                .iter()
                .map(|f| (f.key.as_str(), f.value.as_str()))
                .collect()
        }

        #[test]
        fn bracketed_fields_allow_nesting() {
            let text = "call [who:: [[Alice]]] (due:: 2024-03-01)";
            let fields = extract_inline_fields(text, FieldGrammar::Strict);
            assert_eq!(keys(&fields), vec![("who", "[[Alice]]"), ("due", "2024-03-01")]);
            assert_eq!(fields[0].kind, FieldKind::User);
            assert_eq!(fields[1].kind, FieldKind::Task);
            assert_eq!(fields[0].span.slice(text), "[who:: [[Alice]]]");
        }

        #[test]
        fn shorthands_only_in_lenient_grammar() {
            let text = "pay rent @due(2024-01-01) 📅 2024-02-01 ⏫";
            assert!(extract_inline_fields(text, FieldGrammar::Strict).is_empty());
            let fields = extract_inline_fields(text, FieldGrammar::Lenient);
            assert_eq!(
                keys(&fields),
                vec![
                    ("due", "2024-01-01"),
                    ("due", "2024-02-01"),
                    ("priority", "high")
                ]
            );
            assert_eq!(fields[0].span.slice(text), "@due(2024-01-01)");
            assert!(fields.iter().all(|f| f.kind == FieldKind::Task));
        }

        #[test]
        fn code_is_never_scanned() {
            let text = "`[a:: b]` [c:: d]\n```\nx:: y\n```";
            let fields = extract_inline_fields(text, FieldGrammar::Lenient);
            assert_eq!(keys(&fields), vec![("c", "d")]);
        }

        #[test]
        fn full_line_fields_need_a_free_line() {
            let text = "title\nowner:: Bob\nnote [k:: v] and x:: y";
            let fields = extract_inline_fields(text, FieldGrammar::Strict);
            assert_eq!(keys(&fields), vec![("owner", "Bob"), ("k", "v")]);
            assert_eq!(fields[0].span.slice(text), "owner:: Bob");
        }

        #[test]
        fn task_keys_match_case_insensitively() {
            assert!(is_task_field("onCompletion"));
            assert!(is_task_field("DUE"));
            assert!(!is_task_field("owner"));
        }
    }
}

pub mod edit {
    //! Text surgery shared by item parsing and formatting.

    use crate::core::{BoardError, SourceRange};
    use once_cell::sync::Lazy;
    use regex::Regex;

    /// Indentation for continuation lines of a multi-line item.
    pub const CONTINUATION_INDENT: &str = "    ";

    static BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid br regex"));
    static TRAILING_BLOCK_ID: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?:^|\s+)\^[A-Za-z0-9-]+\s*$").expect("valid block id regex"));

    /* ----------------------------- Deletions ----------------------------- */

    /// Non-overlapping ranges to cut out of one text, applied in a single pass.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Deletions {
        marks: Vec<SourceRange>,
    }

    impl Deletions {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn marks(&self) -> &[SourceRange] {
            &self.marks
        }

        /// End of the furthest mark so far; 0 when nothing is marked.
        pub fn max_end(&self) -> usize {
            self.marks.iter().map(|m| m.end).max().unwrap_or(0)
        }

        pub fn mark(&mut self, text: &str, range: SourceRange) -> Result<(), BoardError> {
            let valid = range.start <= range.end
                && range.end <= text.len()
                && text.is_char_boundary(range.start)
                && text.is_char_boundary(range.end);
            if !valid {
                return Err(BoardError::InvalidRange {
                    range,
                    len: text.len(),
                });
            }
            if range.is_empty() {
                return Ok(());
            }
            if let Some(existing) = self.marks.iter().find(|m| m.overlaps(&range)) {
                return Err(BoardError::OverlappingDeletion {
                    existing: *existing,
                    requested: range,
                });
            }
            self.marks.push(range);
            Ok(())
        }

        /// `text` with every marked range removed.
        pub fn apply(&self, text: &str) -> Result<String, BoardError> {
            let mut marks = self.marks.clone();
            marks.sort_by_key(|m| m.start);
            let mut out = text.to_string();
            for mark in marks.iter().rev() {
                if mark.end > out.len() {
                    return Err(BoardError::InvalidRange {
                        range: *mark,
                        len: text.len(),
                    });
                }
                out.replace_range(mark.start..mark.end, "");
            }
            Ok(out)
        }
    }

    /// Extends `range` backwards over spaces and tabs, but not below `floor`. A range that
    /// then starts the text swallows the blanks after it instead.
    pub fn widen_over_blanks(text: &str, range: SourceRange, floor: usize) -> SourceRange {
        let head = &text[..range.start];
        let blanks = head.len() - head.trim_end_matches([' ', '\t']).len();
        let start = range.start.saturating_sub(blanks).max(floor).min(range.start);
        if start > 0 {
            return SourceRange::new(start, range.end);
        }
        let tail = &text[range.end..];
        let trailing = tail.len() - tail.trim_start_matches([' ', '\t']).len();
        SourceRange::new(start, range.end + trailing)
    }

    /* ------------------------------ Lines ------------------------------ */

    pub fn indent_new_lines(text: &str) -> String {
        text.replace('\n', &format!("\n{CONTINUATION_INDENT}"))
    }

    /// Inverse of `indent_new_lines`: drops one tab or up to four spaces after each newline.
    pub fn dedent_new_lines(text: &str) -> String {
        let mut lines = text.split('\n');
        let mut out = lines.next().unwrap_or_default().to_string();
        for line in lines {
            out.push('\n');
            let stripped = match line.strip_prefix('\t') {
                Some(rest) => rest,
                None => {
                    let spaces = line.len() - line.trim_start_matches(' ').len();
                    &line[spaces.min(CONTINUATION_INDENT.len())..]
                }
            };
            out.push_str(stripped);
        }
        out
    }

    pub fn replace_brs(text: &str) -> String {
        BR.replace_all(text, "\n").into_owned()
    }

    pub fn replace_new_lines(text: &str) -> String {
        text.replace("\r\n", "\n").replace('\n', "<br>")
    }

    pub fn remove_block_id(text: &str) -> String {
        TRAILING_BLOCK_ID.replace(text, "").into_owned()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn deletions_are_applied_back_to_front() {
            let text = "buy milk #errand @due(x)";
            let mut cuts = Deletions::new();
            cuts.mark(text, SourceRange::new(17, 24)).unwrap();
            cuts.mark(text, SourceRange::new(8, 16)).unwrap();
            assert_eq!(cuts.apply(text).unwrap(), "buy milk ");
            assert_eq!(cuts.max_end(), 24);
        }

        #[test]
        fn overlapping_or_invalid_marks_are_rejected() {
            let text = "héllo world";
            let mut cuts = Deletions::new();
            cuts.mark(text, SourceRange::new(0, 4)).unwrap();
            assert!(matches!(
                cuts.mark(text, SourceRange::new(3, 6)),
                Err(BoardError::OverlappingDeletion { .. })
            ));
            assert!(matches!(
                cuts.mark(text, SourceRange::new(5, 40)),
                Err(BoardError::InvalidRange { .. })
            ));
            // Byte 2 falls inside 'é'.
            assert!(matches!(
                cuts.mark(text, SourceRange::new(2, 6)),
                Err(BoardError::InvalidRange { .. })
            ));
            assert_eq!(cuts.marks().len(), 1);
        }

        #[test]
        fn widening_stops_at_floor() {
            let text = "a  #b  #c";
            let widened = widen_over_blanks(text, SourceRange::new(7, 9), 5);
            assert_eq!(widened, SourceRange::new(5, 9));
            let widened = widen_over_blanks(text, SourceRange::new(3, 5), 0);
            assert_eq!(widened, SourceRange::new(1, 5));
            let widened = widen_over_blanks("#a  rest", SourceRange::new(0, 2), 0);
            assert_eq!(widened, SourceRange::new(0, 4));
        }

        #[test]
        fn indentation_round_trips() {
            let text = "first\nsecond\n\tthird";
            assert_eq!(dedent_new_lines(&indent_new_lines(text)), text);
            assert_eq!(dedent_new_lines("a\n\tb\n  c"), "a\nb\nc");
        }

        #[test]
        fn line_break_markup() {
            assert_eq!(replace_brs("a<br>b<BR/>c<br />d"), "a\nb\nc\nd");
            assert_eq!(replace_new_lines("a\nb"), "a<br>b");
            assert_eq!(remove_block_id("task ^abc-1  "), "task");
            assert_eq!(remove_block_id("task ^ not"), "task ^ not");
            assert_eq!(remove_block_id("x^2"), "x^2");
        }
    }
}

pub mod item {
    //! List item <-> `ItemData`.
    //!
    //! Decomposition reads one list item node and pulls out block id, tags, date, time, file
    //! link and inline fields. Which of those are cut from the display title depends on the
    //! board settings; the raw title always keeps them so composing it back is lossless.

    use crate::core::{BoardError, FieldKind, FileAccessor, InlineField, ItemData, ItemMetadata};
    use crate::edit::{
        Deletions, dedent_new_lines, indent_new_lines, remove_block_id, replace_brs,
        widen_over_blanks,
    };
    use crate::fields::{FieldGrammar, extract_inline_fields};
    use crate::settings::{InlineMetadataPosition, SettingsLookup};
    use crate::syntax::{self, Node, NodeKind, NodeType, Visit};
    use chrono::{NaiveDate, NaiveTime};
    use indexmap::IndexMap;
    use once_cell::sync::Lazy;
    use regex::Regex;
    use std::cmp::Ordering;

    static BARE_CHECKBOX: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\[(.)\]$").expect("valid checkbox regex"));

    /* ------------------------------ Hooks ------------------------------ */

    /// Last rewrite of a display title before it is stored.
    pub trait TitlePreprocessor {
        fn preprocess(&self, title: &str) -> String;
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct VerbatimTitle;

    impl TitlePreprocessor for VerbatimTitle {
        fn preprocess(&self, title: &str) -> String {
            title.to_string()
        }
    }

    /// Front matter of the note a wikilink points at, if it can be resolved.
    pub trait FileMetadataSource {
        fn file_metadata(&self, target: &str) -> Option<IndexMap<String, String>>;
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct NoFileMetadata;

    impl FileMetadataSource for NoFileMetadata {
        fn file_metadata(&self, _target: &str) -> Option<IndexMap<String, String>> {
            None
        }
    }

    impl FileMetadataSource for IndexMap<String, IndexMap<String, String>> {
        fn file_metadata(&self, target: &str) -> Option<IndexMap<String, String>> {
            self.get(target).cloned()
        }
    }

    pub struct ItemContext<'a> {
        pub settings: SettingsLookup<'a>,
        pub preprocessor: &'a dyn TitlePreprocessor,
        pub files: &'a dyn FileMetadataSource,
    }

    /* --------------------------- Decomposition --------------------------- */

    pub fn decompose_item(
        source: &str,
        node: &Node,
        ctx: &ItemContext<'_>,
    ) -> Result<ItemData, BoardError> {
        let NodeKind::ListItem { checkbox } = node.kind else {
            return Err(BoardError::ItemDecompose(format!(
                "expected a list item, found {:?}",
                node.node_type()
            )));
        };
        if node.children.is_empty() {
            return Err(BoardError::ItemDecompose(format!(
                "list item at {}..{} has no content",
                node.range.start, node.range.end
            )));
        }

        let boundary = syntax::content_boundary(node);
        let mut content = boundary.slice(source);
        let mut check = checkbox;
        // `- [x]` with no text never parses as a task, so the marker is the whole paragraph.
        if checkbox.is_none() {
            if let Some(caps) = BARE_CHECKBOX.captures(content) {
                check = caps[1].chars().next();
                content = "";
            }
        }
        let (checked, check_char) = match check {
            Some(' ') | None => (false, ' '),
            Some(c) => (true, c),
        };

        let settings = ctx.settings;
        let mut metadata = ItemMetadata::default();
        let mut block_id = None;
        let mut search = String::new();
        let mut cuts = Deletions::new();

        if !content.is_empty() {
            for child in &node.children {
                syntax::try_visit(child, &mut |n: &Node| -> Result<Visit, BoardError> {
                    push_search_text(n, &mut search);
                    let mut cut = |wanted: bool| -> Result<(), BoardError> {
                        if !wanted {
                            return Ok(());
                        }
                        let range = n.range.relative_to(boundary.start);
                        let range = widen_over_blanks(content, range, cuts.max_end());
                        cuts.mark(content, range)
                    };
                    match &n.kind {
                        NodeKind::BlockId { value } => {
                            block_id = Some(value.clone());
                            cut(true)?;
                        }
                        NodeKind::Hashtag { value } => {
                            metadata.tags.push(format!("#{value}"));
                            cut(settings.move_tags())?;
                        }
                        NodeKind::Date { date } | NodeKind::DateLink { date } => {
                            metadata.date_str.get_or_insert_with(|| date.clone());
                            cut(settings.move_dates())?;
                        }
                        NodeKind::Time { time } => {
                            metadata.time_str.get_or_insert_with(|| time.clone());
                            cut(settings.move_dates())?;
                        }
                        NodeKind::EmbedWikilink { target } => {
                            metadata.file_accessor.get_or_insert_with(|| FileAccessor {
                                target: target.clone(),
                                is_embed: true,
                                strip_heading: false,
                            });
                        }
                        NodeKind::EmbedLink { url, .. } => {
                            metadata.file_accessor.get_or_insert_with(|| FileAccessor {
                                target: url.clone(),
                                is_embed: true,
                                strip_heading: true,
                            });
                        }
                        NodeKind::Wikilink { target, .. } => {
                            if metadata.file_accessor.is_none() {
                                metadata.file_accessor = Some(FileAccessor {
                                    target: target.clone(),
                                    is_embed: false,
                                    strip_heading: false,
                                });
                                if let Some(found) = ctx.files.file_metadata(target) {
                                    metadata.file_metadata_order = found.keys().cloned().collect();
                                    metadata.file_metadata = Some(found);
                                }
                            }
                            return Ok(Visit::Skip);
                        }
                        NodeKind::Root
                        | NodeKind::Heading { .. }
                        | NodeKind::Paragraph
                        | NodeKind::List { .. }
                        | NodeKind::ListItem { .. }
                        | NodeKind::Text { .. }
                        | NodeKind::Image { .. }
                        | NodeKind::InlineCode { .. }
                        | NodeKind::Code { .. }
                        | NodeKind::Link { .. }
                        | NodeKind::ThematicBreak => return Ok(Visit::Continue),
                    }
                    Ok(Visit::Skip)
                })?;
            }
        }

        let display = dedent_new_lines(&replace_brs(cuts.apply(content)?.trim()));
        let display = strip_fields(&display, settings)?;
        let title = ctx.preprocessor.preprocess(&display);

        let title_raw = remove_block_id(&dedent_new_lines(&replace_brs(content)));
        metadata.inline_fields = visible_fields(&title_raw);

        metadata.date = metadata
            .date_str
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, settings.date_format()).ok());
        metadata.time = metadata
            .time_str
            .as_deref()
            .and_then(|t| NaiveTime::parse_from_str(t, settings.time_format()).ok());

        metadata.tags.sort_by(|a, b| tag_order(a, b));
        metadata.tags.dedup();

        Ok(ItemData {
            checked,
            check_char,
            title_raw,
            title,
            title_search: search.trim().to_string(),
            block_id,
            metadata,
        })
    }

    fn push_search_text(node: &Node, out: &mut String) {
        match &node.kind {
            NodeKind::Text { value }
            | NodeKind::InlineCode { value }
            | NodeKind::Code { value, .. } => out.push_str(value),
            NodeKind::Wikilink { target, alias } => {
                out.push_str(alias.as_deref().unwrap_or(target.as_str()))
            }
            NodeKind::EmbedWikilink { target } => out.push_str(target),
            NodeKind::Image { alt, .. } | NodeKind::EmbedLink { alt, .. } => out.push_str(alt),
            NodeKind::Hashtag { value } => {
                out.push_str(" #");
                out.push_str(value);
            }
            NodeKind::Date { date } | NodeKind::DateLink { date } => out.push_str(date),
            NodeKind::Time { time } => out.push_str(time),
            NodeKind::Paragraph | NodeKind::Heading { .. } if !out.is_empty() => out.push('\n'),
            NodeKind::Root
            | NodeKind::Heading { .. }
            | NodeKind::Paragraph
            | NodeKind::List { .. }
            | NodeKind::ListItem { .. }
            | NodeKind::BlockId { .. }
            | NodeKind::Link { .. }
            | NodeKind::ThematicBreak => {}
        }
    }

    /// Fields that count for an item: user fields anywhere, task fields on the first line.
    pub fn visible_fields(text: &str) -> Vec<InlineField> {
        let first_break = text.find('\n');
        extract_inline_fields(text, FieldGrammar::Lenient)
            .into_iter()
            .filter(|f| match (f.kind, first_break) {
                (FieldKind::User, _) | (FieldKind::Task, None) => true,
                (FieldKind::Task, Some(line_end)) => f.span.end <= line_end,
            })
            .collect()
    }

    fn strip_fields(text: &str, settings: SettingsLookup<'_>) -> Result<String, BoardError> {
        let move_task = settings.move_task_metadata();
        let move_user = settings.inline_metadata_position() != InlineMetadataPosition::Body;
        let mut cuts = Deletions::new();
        for field in visible_fields(text) {
            let wanted = match field.kind {
                FieldKind::Task => move_task,
                FieldKind::User => move_user,
            };
            if wanted {
                let range = widen_over_blanks(text, field.span, cuts.max_end());
                cuts.mark(text, range)?;
            }
        }
        Ok(cuts.apply(text)?.trim().to_string())
    }

    /// Case-insensitive natural order; digit runs compare by value.
    pub fn tag_order(a: &str, b: &str) -> Ordering {
        natural_cmp(&a.to_lowercase(), &b.to_lowercase()).then_with(|| a.cmp(b))
    }

    fn natural_cmp(a: &str, b: &str) -> Ordering {
        let mut left = a.chars().peekable();
        let mut right = b.chars().peekable();
        loop {
            match (left.peek().copied(), right.peek().copied()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                    let l = take_digits(&mut left);
                    let r = take_digits(&mut right);
                    let (l, r) = (l.trim_start_matches('0'), r.trim_start_matches('0'));
                    let ord = l.len().cmp(&r.len()).then_with(|| l.cmp(r));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                (Some(x), Some(y)) => {
                    if x != y {
                        return x.cmp(&y);
                    }
                    left.next();
                    right.next();
                }
            }
        }
    }

    fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
        let mut digits = String::new();
        while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
            digits.push(c);
        }
        digits
    }

    /* ----------------------------- Composition ----------------------------- */

    /// Markdown line(s) for one item. The block id is written exactly once.
    pub fn compose_item(data: &ItemData) -> String {
        let mark = if data.checked { data.check_char } else { ' ' };
        let mut out = format!("- [{mark}]");
        let body = remove_block_id(&data.title_raw);
        let body = body.trim();
        if !body.is_empty() {
            out.push(' ');
            out.push_str(&indent_new_lines(body));
        }
        if let Some(id) = &data.block_id {
            out.push_str(" ^");
            out.push_str(id);
        }
        out
    }

    /// Parses markdown for a single item, e.g. the output of `compose_item`.
    pub fn parse_item_text(text: &str, ctx: &ItemContext<'_>) -> Result<ItemData, BoardError> {
        let root = syntax::parse_markdown(text)?;
        let item = root
            .children
            .first()
            .filter(|n| n.is(NodeType::List))
            .and_then(|list| list.children.first())
            .ok_or_else(|| {
                BoardError::ItemDecompose(format!("no list item in {:?}", text.trim()))
            })?;
        decompose_item(text, item, ctx)
    }

}

pub mod parser {
    //! Board document -> `Board`.
    //!
    //! Parsing strategy:
    //! - Optional YAML front matter is split off first and parsed with `serde_yaml`.
    //! - The body becomes a markdown AST (`syntax`); the `%% kanban:settings` paragraph and the
    //!   code block after it hold the JSON settings footer.
    //! - Headings are flat in the AST; the lane tree is stack-built from their levels.

    use crate::core::{Board, BoardError, Item, Lane, LaneChild};
    use crate::edit::replace_brs;
    use crate::item::{
        FileMetadataSource, ItemContext, NoFileMetadata, TitlePreprocessor, VerbatimTitle,
        decompose_item,
    };
    use crate::settings::{BoardSettings, Locale, SettingsLookup};
    use crate::syntax::{self, Node, NodeKind, NodeType};
    use indexmap::IndexMap;
    use log::{debug, warn};
    use once_cell::sync::Lazy;
    use regex::Regex;
    use std::path::PathBuf;

    pub const SETTINGS_MARKER: &str = "%% kanban:settings";

    static MAX_ITEMS: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)^(.*?)\s*\((\d+)\)$").expect("valid max items regex"));

    /// Everything a parse needs besides the text itself.
    pub struct ParseOptions {
        /// Defaults for keys the board's own footer does not set.
        pub global: Option<BoardSettings>,
        pub locale: Locale,
        pub preprocessor: Box<dyn TitlePreprocessor>,
        pub files: Box<dyn FileMetadataSource>,
    }

    impl Default for ParseOptions {
        fn default() -> Self {
            Self {
                global: None,
                locale: Locale::default(),
                preprocessor: Box::new(VerbatimTitle),
                files: Box::new(NoFileMetadata),
            }
        }
    }

    impl ParseOptions {
        pub fn item_context<'a>(&'a self, local: &'a BoardSettings) -> ItemContext<'a> {
            ItemContext {
                settings: SettingsLookup::new(local, self.global.as_ref()),
                preprocessor: self.preprocessor.as_ref(),
                files: self.files.as_ref(),
            }
        }
    }

    /* ------------------------ Public entry points ------------------------ */

    /// Parse a board document. Fails only if the document as a whole is unreadable;
    /// individual malformed items are skipped and listed in `Board::errors`.
    pub fn parse_board_from_str(
        path: Option<PathBuf>,
        input: &str,
        options: &ParseOptions,
    ) -> Result<Board, BoardError> {
        let (frontmatter, body_start) = split_frontmatter(input)?;
        let root = syntax::parse_markdown_from(input, body_start)?;
        let (settings, footer) = extract_settings_footer(input, &root.children)?;
        let blocks = &root.children[..footer.unwrap_or(root.children.len())];

        let assembled = assemble(input, blocks, &settings, options);

        let mut board = Board::new(path);
        board.frontmatter = frontmatter;
        board.settings = settings;
        board.lanes = assembled.lanes;
        board.archive = assembled.archive;
        board.errors = assembled.errors;
        debug!(
            "parsed board {}: {} top-level lanes, {} archived items",
            board.id(),
            board.lanes.len(),
            board.archive.len()
        );
        Ok(board)
    }

    /* ---------------------------- Front matter ---------------------------- */

    /// Front matter map and the byte offset where the body starts.
    pub fn split_frontmatter(
        input: &str,
    ) -> Result<(IndexMap<String, serde_yaml::Value>, usize), BoardError> {
        let empty = (IndexMap::new(), 0);
        let Some(after_open) = input.strip_prefix("---") else {
            return Ok(empty);
        };
        let Some(body) = after_open
            .strip_prefix("\r\n")
            .or_else(|| after_open.strip_prefix('\n'))
        else {
            return Ok(empty);
        };
        let yaml_start = input.len() - body.len();
        let mut offset = yaml_start;
        for chunk in body.split_inclusive('\n') {
            if chunk.trim_end() == "---" {
                let yaml = &input[yaml_start..offset];
                let map = if yaml.trim().is_empty() {
                    IndexMap::new()
                } else {
                    serde_yaml::from_str(yaml).map_err(|e| BoardError::DocumentParse {
                        stage: "frontmatter",
                        message: e.to_string(),
                    })?
                };
                return Ok((map, offset + chunk.len()));
            }
            offset += chunk.len();
        }
        // No closing fence: the leading `---` is an ordinary rule.
        Ok(empty)
    }

    /* --------------------------- Settings footer --------------------------- */

    /// Settings from the footer and the index of its marker paragraph.
    fn extract_settings_footer(
        source: &str,
        blocks: &[Node],
    ) -> Result<(BoardSettings, Option<usize>), BoardError> {
        let Some(marker) = blocks.iter().position(|n| {
            n.is(NodeType::Paragraph)
                && syntax::extract(source, n.range)
                    .trim_start()
                    .starts_with(SETTINGS_MARKER)
        }) else {
            return Ok((BoardSettings::default(), None));
        };
        let settings = match blocks.get(marker + 1).map(|n| &n.kind) {
            Some(NodeKind::Code { value, .. }) if !value.trim().is_empty() => {
                serde_json::from_str(value).map_err(|e| BoardError::DocumentParse {
                    stage: "settings",
                    message: e.to_string(),
                })?
            }
            _ => BoardSettings::default(),
        };
        Ok((settings, Some(marker)))
    }

    /* ------------------------------ Lanes ------------------------------ */

    struct Assembled {
        lanes: Vec<Lane>,
        archive: Vec<Item>,
        errors: Vec<String>,
    }

    fn assemble(
        source: &str,
        blocks: &[Node],
        local: &BoardSettings,
        options: &ParseOptions,
    ) -> Assembled {
        let ctx = options.item_context(local);
        let mut stack: Vec<Lane> = Vec::new();
        let mut roots: Vec<Lane> = Vec::new();
        let mut archive = Vec::new();
        let mut errors = Vec::new();
        // Levels count from the shallowest heading, but never from deeper than `##`.
        let top = blocks
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Heading { depth } => Some(depth),
                _ => None,
            })
            .min()
            .unwrap_or(2)
            .min(2);

        for (index, node) in blocks.iter().enumerate() {
            let NodeKind::Heading { depth } = node.kind else {
                continue;
            };
            let heading = syntax::extract(source, syntax::content_boundary(node)).trim();

            let mut complete = false;
            let list = syntax::first_next_of_type(blocks, index, NodeType::List, |n| {
                if n.is(NodeType::Paragraph)
                    && options
                        .locale
                        .is_complete_marker(syntax::extract(source, n.range))
                {
                    complete = true;
                }
                !n.is(NodeType::Heading)
            })
            .map(|(_, list)| list);

            let level = (depth + 1).saturating_sub(top).max(1);
            let follows_rule = index
                .checked_sub(1)
                .is_some_and(|prev| blocks[prev].is(NodeType::ThematicBreak));

            if heading == options.locale.archive && follows_rule && list.is_some() {
                close_lanes(&mut stack, &mut roots, level);
                if let Some(list) = list {
                    archive.extend(collect_items(source, list, &ctx, &mut errors));
                }
                continue;
            }

            let (title, max_items) = parse_lane_title(heading);
            let mut lane = Lane::new(title, level);
            lane.max_items = max_items;
            lane.should_mark_items_complete = complete;
            if let Some(list) = list {
                lane.children = collect_items(source, list, &ctx, &mut errors)
                    .into_iter()
                    .map(LaneChild::Item)
                    .collect();
            }

            close_lanes(&mut stack, &mut roots, level);
            lane.parent_id = stack.last().map(|parent| parent.id);
            stack.push(lane);
        }

        close_lanes(&mut stack, &mut roots, 0);
        Assembled {
            lanes: roots,
            archive,
            errors,
        }
    }

    /// Pops every open lane at `level` or deeper into its parent (or the roots).
    fn close_lanes(stack: &mut Vec<Lane>, roots: &mut Vec<Lane>, level: u8) {
        while stack.last().is_some_and(|top| top.level >= level) {
            let Some(completed) = stack.pop() else {
                break;
            };
            match stack.last_mut() {
                Some(parent) => parent.children.push(LaneChild::Lane(completed)),
                None => roots.push(completed),
            }
        }
    }

    fn collect_items(
        source: &str,
        list: &Node,
        ctx: &ItemContext<'_>,
        errors: &mut Vec<String>,
    ) -> Vec<Item> {
        list.children
            .iter()
            .filter_map(|node| match decompose_item(source, node, ctx) {
                Ok(data) => Some(Item::new(data)),
                Err(e) => {
                    warn!("skipping list item: {e}");
                    errors.push(e.to_string());
                    None
                }
            })
            .collect()
    }

    /// Heading text -> (title, item cap). `Doing (3)` caps the lane at three items.
    pub fn parse_lane_title(heading: &str) -> (String, Option<u32>) {
        let text = replace_brs(heading);
        let capped = MAX_ITEMS.captures(&text).and_then(|caps| {
            let max = caps[2].parse::<u32>().ok()?;
            Some((caps[1].to_string(), max))
        });
        match capped {
            Some((title, max)) => (title, Some(max)),
            None => (text, None),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::core::LaneId;

        fn parse(input: &str) -> Board {
            parse_board_from_str(None, input, &ParseOptions::default()).expect("board")
        }

        fn titles<'a>(lanes: impl Iterator<Item = &'a Lane>) -> Vec<&'a str> {
            lanes.map(|lane| lane.title.as_str()).collect()
        }

        #[test]
        fn nested_headings_become_nested_lanes() {
            let board = parse(
                "## Lane A\n\n- [ ] a1\n\n### Lane B\n\n- [ ] b1\n\n## Lane C\n\n- [ ] c1\n",
            );
            assert_eq!(titles(board.lanes.iter()), vec!["Lane A", "Lane C"]);
            let a = &board.lanes[0];
            assert_eq!(titles(a.lanes()), vec!["Lane B"]);
            let b = a.lanes().next().expect("lane b");
            assert_eq!(b.parent_id, Some(a.id));
            assert_eq!(b.level, 2);
            let c = &board.lanes[1];
            let c_items: Vec<&str> = c.items().map(|i| i.data.title.as_str()).collect();
            assert_eq!(c_items, vec!["c1"]);
            assert_eq!(c.parent_id, None::<LaneId>);
        }

        #[test]
        fn shallower_heading_closes_several_lanes() {
            let board = parse("## A\n\n### B\n\n#### C\n\n- [ ] deep\n\n## D\n\n- [ ] top\n");
            board.validate().expect("valid hierarchy");
            assert_eq!(titles(board.lanes.iter()), vec!["A", "D"]);

            let a = &board.lanes[0];
            let b = a.lanes().next().expect("lane b");
            let c = b.lanes().next().expect("lane c");
            assert_eq!((a.level, b.level, c.level), (1, 2, 3));
            assert_eq!(b.parent_id, Some(a.id));
            assert_eq!(c.parent_id, Some(b.id));
            assert_eq!(c.items().count(), 1);

            let d = &board.lanes[1];
            assert_eq!(d.parent_id, None::<LaneId>);
            assert_eq!(d.lanes().count(), 0);
            let d_items: Vec<&str> = d.items().map(|i| i.data.title.as_str()).collect();
            assert_eq!(d_items, vec!["top"]);
        }

        #[test]
        fn top_level_hash_headings_keep_their_nesting() {
            let board = parse("# A\n\n- [ ] a1\n\n## B\n\n- [ ] b1\n");
            board.validate().expect("valid hierarchy");
            assert_eq!(titles(board.lanes.iter()), vec!["A"]);
            let a = &board.lanes[0];
            let b = a.lanes().next().expect("lane b");
            assert_eq!((a.level, b.level), (1, 2));
            assert_eq!(b.parent_id, Some(a.id));

            let text = crate::format::format_board(&board, &Default::default()).expect("format");
            assert!(text.starts_with("## A\n\n- [ ] a1\n\n\n\n### B\n"));
            let again = parse(&text);
            assert_eq!(again.lanes[0].lanes().next().map(|b| b.level), Some(2));
        }

        #[test]
        fn archive_needs_a_preceding_rule() {
            let board = parse("## Todo\n\n- [ ] x\n\n***\n\n## Archive\n\n- [x] old\n");
            assert_eq!(titles(board.lanes.iter()), vec!["Todo"]);
            assert_eq!(board.archive.len(), 1);
            assert_eq!(board.archive[0].data.title, "old");

            let board = parse("## Todo\n\n- [ ] x\n\n## Archive\n\n- [x] old\n");
            assert_eq!(titles(board.lanes.iter()), vec!["Todo", "Archive"]);
            assert!(board.archive.is_empty());
        }

        #[test]
        fn heading_decorations_are_read() {
            let board = parse("## Done (5)\n\n**Complete**\n- [x] shipped\n");
            let lane = &board.lanes[0];
            assert_eq!(lane.title, "Done");
            assert_eq!(lane.max_items, Some(5));
            assert!(lane.should_mark_items_complete);
            assert_eq!(lane.items().count(), 1);
        }

        #[test]
        fn frontmatter_and_settings_footer_are_kept() {
            let input = "---\n\nkanban-plugin: basic\n\n---\n\n## Todo\n\n\n\n%% kanban:settings\n```\n{\"kanban-plugin\":\"basic\",\"move-tags\":true}\n```\n%%";
            let board = parse(input);
            assert_eq!(
                board.frontmatter.get("kanban-plugin"),
                Some(&serde_yaml::Value::from("basic"))
            );
            assert_eq!(board.settings.move_tags, Some(true));
            assert_eq!(titles(board.lanes.iter()), vec!["Todo"]);
            assert_eq!(board.lanes[0].children.len(), 0);
        }

        #[test]
        fn broken_settings_json_fails_the_whole_document() {
            let input = "## Todo\n\n%% kanban:settings\n```\n{not json\n```\n%%";
            let result = parse_board_from_str(None, input, &ParseOptions::default());
            assert!(matches!(
                result,
                Err(BoardError::DocumentParse {
                    stage: "settings",
                    ..
                })
            ));
        }

        #[test]
        fn lane_titles_convert_breaks_and_caps() {
            assert_eq!(
                parse_lane_title("Two<br>lines (12)"),
                ("Two\nlines".to_string(), Some(12))
            );
            assert_eq!(parse_lane_title("Plain"), ("Plain".to_string(), None));
        }
    }
}

pub mod format {
    //! `Board` -> document text. Parsing the output yields an equivalent board, and
    //! formatting that board again yields the same text.

    use crate::core::{Board, BoardError, Item, Lane};
    use crate::edit::replace_new_lines;
    use crate::item::compose_item;
    use crate::parser::SETTINGS_MARKER;
    use crate::settings::Locale;

    pub fn format_board(board: &Board, locale: &Locale) -> Result<String, BoardError> {
        let mut out = String::new();

        if !board.frontmatter.is_empty() {
            let yaml =
                serde_yaml::to_string(&board.frontmatter).map_err(|e| BoardError::Encode {
                    what: "frontmatter",
                    message: e.to_string(),
                })?;
            out.push_str("---\n\n");
            out.push_str(&yaml);
            if !yaml.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("\n---\n\n");
        }

        for lane in &board.lanes {
            format_lane(&mut out, lane, locale);
        }

        if !board.archive.is_empty() {
            out.push_str("***\n\n## ");
            out.push_str(&locale.archive);
            out.push_str("\n\n");
            format_items(&mut out, board.archive.iter());
        }

        let settings = serde_json::to_string(&board.settings).map_err(|e| BoardError::Encode {
            what: "settings",
            message: e.to_string(),
        })?;
        out.push_str("\n\n");
        out.push_str(SETTINGS_MARKER);
        out.push_str("\n```\n");
        out.push_str(&settings);
        out.push_str("\n```\n%%");
        Ok(out)
    }

    /// Heading line of a lane, without the newline.
    pub fn lane_heading(lane: &Lane) -> String {
        let mut heading = "#".repeat(usize::from(lane.level) + 1);
        heading.push(' ');
        heading.push_str(&replace_new_lines(&lane.title));
        if let Some(max) = lane.max_items {
            heading.push_str(&format!(" ({max})"));
        }
        heading
    }

    fn format_lane(out: &mut String, lane: &Lane, locale: &Locale) {
        out.push_str(&lane_heading(lane));
        out.push_str("\n\n");
        if lane.should_mark_items_complete {
            out.push_str(&locale.complete_marker());
            out.push('\n');
        }
        // Items always precede nested lanes; anything after a sub-heading belongs to it.
        format_items(out, lane.items());
        out.push_str("\n\n\n");
        for nested in lane.lanes() {
            format_lane(out, nested, locale);
        }
    }

    fn format_items<'a>(out: &mut String, items: impl Iterator<Item = &'a Item>) {
        for item in items {
            out.push_str(&compose_item(&item.data));
            out.push('\n');
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::parser::{ParseOptions, parse_board_from_str};

        fn round(input: &str) -> String {
            let board = parse_board_from_str(None, input, &ParseOptions::default()).expect("board");
            format_board(&board, &Locale::default()).expect("format")
        }

        #[test]
        fn simple_board_layout() {
            let out = round("## Todo\n\n- [ ] a ^x1\n");
            assert_eq!(
                out,
                "## Todo\n\n- [ ] a ^x1\n\n\n\n\n\n%% kanban:settings\n```\n{}\n```\n%%"
            );
        }

        #[test]
        fn formatting_is_idempotent() {
            let input = "---\n\nkanban-plugin: basic\n\n---\n\n## Doing (2)\n\n- [ ] one #a @{2024-01-02}\n- [ ] two\n    continued\n\n### Blocked\n\n- [ ] three\n\n## Done\n\n**Complete**\n- [x] four\n\n***\n\n## Archive\n\n- [x] five ^old1\n\n%% kanban:settings\n```\n{\"kanban-plugin\":\"basic\"}\n```\n%%";
            let once = round(input);
            let twice = round(&once);
            assert_eq!(once, twice);
            assert!(once.starts_with("---\n\nkanban-plugin: basic\n\n---\n\n## Doing (2)\n\n"));
            assert!(once.contains("### Blocked\n\n- [ ] three\n"));
            assert!(once.contains("## Done\n\n**Complete**\n- [x] four\n"));
            assert!(once.contains("***\n\n## Archive\n\n- [x] five ^old1\n"));
            assert!(once.ends_with("```\n{\"kanban-plugin\":\"basic\"}\n```\n%%"));
        }

        #[test]
        fn lane_heading_writes_breaks_and_cap() {
            let mut lane = Lane::new("Two\nlines", 2);
            lane.max_items = Some(4);
            assert_eq!(lane_heading(&lane), "### Two<br>lines (4)");
        }
    }
}

pub mod ops {
    //! Board mutations and bulk normalisation.

    use crate::core::{Board, BoardError, Item, ItemId, Lane, LaneChild, LaneId, LaneSort};
    use crate::edit::indent_new_lines;
    use crate::item::{ItemContext, compose_item, parse_item_text, tag_order};
    use crate::parser::ParseOptions;
    use crate::settings::{BoardSettings, InsertionMethod, SettingsLookup};
    use log::{debug, warn};
    use std::cmp::Ordering;
    use std::collections::HashSet;

    /* ------------------------------ Lookup ------------------------------ */

    fn lane_in<'a>(lane: &'a Lane, id: LaneId) -> Option<&'a Lane> {
        if lane.id == id {
            return Some(lane);
        }
        lane.lanes().find_map(|nested| lane_in(nested, id))
    }

    fn lane_in_mut(lane: &mut Lane, id: LaneId) -> Option<&mut Lane> {
        if lane.id == id {
            return Some(lane);
        }
        lane.children.iter_mut().find_map(|child| match child {
            LaneChild::Lane(nested) => lane_in_mut(nested, id),
            LaneChild::Item(_) => None,
        })
    }

    fn item_in_mut(lane: &mut Lane, id: ItemId) -> Option<&mut Item> {
        lane.children.iter_mut().find_map(|child| match child {
            LaneChild::Item(item) if item.id == id => Some(item),
            LaneChild::Item(_) => None,
            LaneChild::Lane(nested) => item_in_mut(nested, id),
        })
    }

    fn take_from(lane: &mut Lane, id: ItemId) -> Option<Item> {
        let found = lane
            .children
            .iter()
            .position(|child| matches!(child, LaneChild::Item(item) if item.id == id));
        if let Some(index) = found {
            return match lane.children.remove(index) {
                LaneChild::Item(item) => Some(item),
                LaneChild::Lane(_) => None,
            };
        }
        lane.children.iter_mut().find_map(|child| match child {
            LaneChild::Lane(nested) => take_from(nested, id),
            LaneChild::Item(_) => None,
        })
    }

    fn walk<'a>(lane: &'a Lane, f: &mut impl FnMut(&'a Lane)) {
        f(lane);
        for nested in lane.lanes() {
            walk(nested, f);
        }
    }

    fn not_found(what: &str, id: impl std::fmt::Display) -> BoardError {
        BoardError::NotFound(format!("{what} {id}"))
    }

    impl Board {
        /// Pre-order over every lane, nested ones included.
        pub fn walk_lanes<'a>(&'a self, mut f: impl FnMut(&'a Lane)) {
            for lane in &self.lanes {
                walk(lane, &mut f);
            }
        }

        pub fn find_lane(&self, id: LaneId) -> Option<&Lane> {
            self.lanes.iter().find_map(|lane| lane_in(lane, id))
        }

        pub fn find_lane_mut(&mut self, id: LaneId) -> Option<&mut Lane> {
            self.lanes.iter_mut().find_map(|lane| lane_in_mut(lane, id))
        }

        /// Searches lanes first, then the archive.
        pub fn find_item(&self, id: ItemId) -> Option<&Item> {
            let mut found = None;
            self.walk_lanes(|lane| {
                if found.is_none() {
                    found = lane.items().find(|item| item.id == id);
                }
            });
            found.or_else(|| self.archive.iter().find(|item| item.id == id))
        }

        pub fn find_item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
            if let Some(index) = self.archive.iter().position(|item| item.id == id) {
                return self.archive.get_mut(index);
            }
            self.lanes.iter_mut().find_map(|lane| item_in_mut(lane, id))
        }

        /// Detaches an item from wherever it lives.
        pub fn take_item(&mut self, id: ItemId) -> Option<Item> {
            if let Some(index) = self.archive.iter().position(|item| item.id == id) {
                return Some(self.archive.remove(index));
            }
            self.lanes.iter_mut().find_map(|lane| take_from(lane, id))
        }

        /// Checks the lane tree: levels increase with depth, back-references match owners,
        /// items precede nested lanes, and no item is reachable twice.
        pub fn validate(&self) -> Result<(), BoardError> {
            let mut seen = HashSet::new();
            for lane in &self.lanes {
                if lane.parent_id.is_some() {
                    return Err(BoardError::Hierarchy(format!(
                        "top-level lane {:?} has a parent",
                        lane.title
                    )));
                }
                validate_lane(lane, &mut seen)?;
            }
            for item in &self.archive {
                if !seen.insert(item.id) {
                    return Err(duplicate(item.id));
                }
            }
            Ok(())
        }

        pub fn set_lane_complete(&mut self, lane_id: LaneId, complete: bool) -> Result<(), BoardError> {
            let lane = self
                .find_lane_mut(lane_id)
                .ok_or_else(|| not_found("lane", lane_id.0))?;
            lane.should_mark_items_complete = complete;
            Ok(())
        }

        /// Adds an item to a lane following the board's insertion method. A lane that marks
        /// items complete checks the item with the configured done character.
        pub fn insert_item(
            &mut self,
            lane_id: LaneId,
            mut item: Item,
            global: Option<&BoardSettings>,
        ) -> Result<ItemId, BoardError> {
            let lookup = SettingsLookup::new(&self.settings, global);
            let method = lookup.new_card_insertion_method();
            let done = lookup.done_char();

            let lane = self
                .find_lane_mut(lane_id)
                .ok_or_else(|| not_found("lane", lane_id.0))?;
            if lane.should_mark_items_complete {
                item.data.checked = true;
                item.data.check_char = done;
            }
            let id = item.id;
            lane.insert_item(method, item);
            debug!("inserted item {} into lane {:?}", id.0, lane.title);
            Ok(id)
        }

        /// Moves an item to another lane, keeping its identity.
        pub fn move_item(
            &mut self,
            item_id: ItemId,
            to: LaneId,
            global: Option<&BoardSettings>,
        ) -> Result<(), BoardError> {
            if self.find_lane(to).is_none() {
                return Err(not_found("lane", to.0));
            }
            let item = self
                .take_item(item_id)
                .ok_or_else(|| not_found("item", item_id.0))?;
            self.insert_item(to, item, global)?;
            Ok(())
        }

        pub fn archive_item(&mut self, item_id: ItemId) -> Result<(), BoardError> {
            if self.archive.iter().any(|item| item.id == item_id) {
                return Ok(());
            }
            let item = self
                .take_item(item_id)
                .ok_or_else(|| not_found("item", item_id.0))?;
            self.archive.push(item);
            Ok(())
        }

        /// Replaces an item's text and re-derives its metadata. On failure the item is
        /// left untouched.
        pub fn update_item_title(
            &mut self,
            item_id: ItemId,
            title_raw: &str,
            options: &ParseOptions,
        ) -> Result<(), BoardError> {
            let current = self
                .find_item(item_id)
                .ok_or_else(|| not_found("item", item_id.0))?;
            let mut draft = current.data.clone();
            draft.title_raw = title_raw.trim().to_string();
            let data = parse_item_text(&compose_item(&draft), &options.item_context(&self.settings))?;
            if let Some(item) = self.find_item_mut(item_id) {
                item.data = data;
            }
            Ok(())
        }
    }

    fn duplicate(id: ItemId) -> BoardError {
        BoardError::Hierarchy(format!("item {} is reachable twice", id.0))
    }

    fn validate_lane(lane: &Lane, seen: &mut HashSet<ItemId>) -> Result<(), BoardError> {
        let mut nested_seen = false;
        for child in &lane.children {
            match child {
                LaneChild::Item(item) => {
                    if nested_seen {
                        return Err(BoardError::Hierarchy(format!(
                            "lane {:?} has items after a nested lane",
                            lane.title
                        )));
                    }
                    if !seen.insert(item.id) {
                        return Err(duplicate(item.id));
                    }
                }
                LaneChild::Lane(nested) => {
                    nested_seen = true;
                    if nested.level <= lane.level {
                        return Err(BoardError::Hierarchy(format!(
                            "lane {:?} (level {}) is not deeper than its parent {:?} (level {})",
                            nested.title, nested.level, lane.title, lane.level
                        )));
                    }
                    if nested.parent_id != Some(lane.id) {
                        return Err(BoardError::Hierarchy(format!(
                            "lane {:?} points at the wrong parent",
                            nested.title
                        )));
                    }
                    validate_lane(nested, seen)?;
                }
            }
        }
        Ok(())
    }

    /* ------------------------------ Lanes ------------------------------ */

    impl Lane {
        /// Item slots are the leading children; nested lanes always follow them.
        fn item_slots(&self) -> usize {
            self.children
                .iter()
                .take_while(|child| matches!(child, LaneChild::Item(_)))
                .count()
        }

        pub fn insert_item(&mut self, method: InsertionMethod, item: Item) {
            let at = match method {
                InsertionMethod::Prepend | InsertionMethod::PrependCompact => 0,
                InsertionMethod::Append => self.item_slots(),
            };
            self.children.insert(at, LaneChild::Item(item));
        }

        /// Reorders the lane's own items; nested lanes keep their place.
        pub fn sort_items(&mut self, by: LaneSort) {
            let nested = self.children.split_off(self.item_slots());
            let mut items = std::mem::take(&mut self.children);
            items.sort_by(|a, b| match (a, b) {
                (LaneChild::Item(a), LaneChild::Item(b)) => compare_items(a, b, by),
                _ => Ordering::Equal,
            });
            items.extend(nested);
            self.children = items;
            self.sort = Some(by);
        }
    }

    fn compare_items(a: &Item, b: &Item, by: LaneSort) -> Ordering {
        fn missing_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
            match (a, b) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
        let (a, b) = (&a.data, &b.data);
        match by {
            LaneSort::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            LaneSort::Date => missing_last(a.metadata.date, b.metadata.date)
                .then_with(|| missing_last(a.metadata.time, b.metadata.time)),
            LaneSort::Tags => match (a.metadata.tags.first(), b.metadata.tags.first()) {
                (Some(x), Some(y)) => tag_order(x, y),
                (x, y) => missing_last(x.map(|_| ()), y.map(|_| ())),
            },
        }
    }

    /* ------------------------------ Items ------------------------------ */

    /// A fresh unchecked item for `title`, parsed with the board's rules.
    pub fn item_from_title(title: &str, ctx: &ItemContext<'_>) -> Result<Item, BoardError> {
        let text = format!("- [ ] {}", indent_new_lines(title.trim()));
        Ok(Item::new(parse_item_text(&text, ctx)?))
    }

    #[derive(Debug)]
    pub struct ItemFailure {
        pub item_id: ItemId,
        pub error: BoardError,
    }

    #[derive(Debug)]
    pub struct ReparseReport {
        pub board: Board,
        /// Items that could not be re-derived; they keep their previous data.
        pub failures: Vec<ItemFailure>,
    }

    /// Recomposes and re-parses every item, e.g. after settings changed.
    pub fn reparse_all_items(board: &Board, options: &ParseOptions) -> ReparseReport {
        let mut next = board.clone();
        let settings = board.settings.clone();
        let ctx = options.item_context(&settings);
        let mut failures = Vec::new();
        for lane in &mut next.lanes {
            reparse_lane(lane, &ctx, &mut failures);
        }
        for item in &mut next.archive {
            reparse_one(item, &ctx, &mut failures);
        }
        if !failures.is_empty() {
            warn!(
                "{} of the items on board {} kept their previous data",
                failures.len(),
                board.id()
            );
        }
        ReparseReport {
            board: next,
            failures,
        }
    }

    fn reparse_lane(lane: &mut Lane, ctx: &ItemContext<'_>, failures: &mut Vec<ItemFailure>) {
        for child in &mut lane.children {
            match child {
                LaneChild::Item(item) => reparse_one(item, ctx, failures),
                LaneChild::Lane(nested) => reparse_lane(nested, ctx, failures),
            }
        }
    }

    fn reparse_one(item: &mut Item, ctx: &ItemContext<'_>, failures: &mut Vec<ItemFailure>) {
        match parse_item_text(&compose_item(&item.data), ctx) {
            Ok(data) => item.data = data,
            Err(error) => {
                warn!("item {} could not be reparsed: {error}", item.id.0);
                failures.push(ItemFailure {
                    item_id: item.id,
                    error,
                });
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::parser::parse_board_from_str;
        use serde_json::json;

        fn board(input: &str) -> Board {
            parse_board_from_str(None, input, &ParseOptions::default()).expect("board")
        }

        fn lane_id(board: &Board, title: &str) -> LaneId {
            let mut found = None;
            board.walk_lanes(|lane| {
                if lane.title == title {
                    found = Some(lane.id);
                }
            });
            found.expect("lane")
        }

        fn item_titles(lane: &Lane) -> Vec<&str> {
            lane.items().map(|i| i.data.title.as_str()).collect()
        }

        #[test]
        fn complete_lane_checks_new_items_with_done_char() {
            let mut board = board("## Todo\n\n- [ ] a\n\n## Done\n\n- [x] b\n");
            let done = lane_id(&board, "Done");
            board.set_lane_complete(done, true).unwrap();

            let global: BoardSettings = serde_json::from_value(json!({"done-char": "✓"})).unwrap();
            let options = ParseOptions::default();
            let item = item_from_title("ship it", &options.item_context(&board.settings)).unwrap();
            let id = board.insert_item(done, item, Some(&global)).unwrap();

            let added = board.find_item(id).expect("added");
            assert!(added.data.checked);
            assert_eq!(added.data.check_char, '✓');
            assert_eq!(compose_item(&added.data), "- [✓] ship it");
        }

        #[test]
        fn insertion_method_and_nested_lanes() {
            let mut board = board("## A\n\n- [ ] one\n\n### B\n\n- [ ] inner\n");
            let a = lane_id(&board, "A");
            let options = ParseOptions::default();
            let ctx_item = |title: &str, board: &Board| {
                item_from_title(title, &options.item_context(&board.settings)).unwrap()
            };

            let two = ctx_item("two", &board);
            board.insert_item(a, two, None).unwrap();
            board.settings.new_card_insertion_method = Some(InsertionMethod::Prepend);
            let zero = ctx_item("zero", &board);
            board.insert_item(a, zero, None).unwrap();

            let lane = board.find_lane(a).unwrap();
            assert_eq!(item_titles(lane), vec!["zero", "one", "two"]);
            assert!(matches!(lane.children.last(), Some(LaneChild::Lane(_))));
            board.validate().unwrap();
        }

        #[test]
        fn move_and_archive_keep_identity() {
            let mut board = board("## Todo\n\n- [ ] a\n\n## Done\n\n**Complete**\n");
            let done = lane_id(&board, "Done");
            let id = board.lanes[0].items().next().unwrap().id;

            board.move_item(id, done, None).unwrap();
            assert_eq!(board.lanes[0].items().count(), 0);
            let moved = board.find_item(id).unwrap();
            assert!(moved.data.checked);
            assert_eq!(moved.data.check_char, 'x');

            board.archive_item(id).unwrap();
            assert_eq!(board.archive[0].id, id);
            assert!(board.find_lane(done).unwrap().items().next().is_none());

            let missing = LaneId::new();
            assert!(matches!(
                board.move_item(id, missing, None),
                Err(BoardError::NotFound(_))
            ));
            assert_eq!(board.archive.len(), 1);
        }

        #[test]
        fn update_title_rederives_metadata() {
            let mut board = board("## Todo\n\n- [ ] old ^keep\n");
            let id = board.lanes[0].items().next().unwrap().id;
            board
                .update_item_title(id, "new #tag", &ParseOptions::default())
                .unwrap();
            let item = board.find_item(id).unwrap();
            assert_eq!(item.data.title_raw, "new #tag");
            assert_eq!(item.data.metadata.tags, vec!["#tag"]);
            assert_eq!(item.data.block_id.as_deref(), Some("keep"));
        }

        #[test]
        fn sorting_touches_only_items() {
            let mut board = board(
                "## L\n\n- [ ] b @{2024-02-01}\n- [ ] a\n- [ ] c @{2024-01-01}\n\n### Sub\n",
            );
            let l = lane_id(&board, "L");
            let lane = board.find_lane_mut(l).unwrap();
            lane.sort_items(LaneSort::Title);
            assert_eq!(
                item_titles(lane),
                vec!["a", "b @{2024-02-01}", "c @{2024-01-01}"]
            );
            lane.sort_items(LaneSort::Date);
            assert_eq!(
                item_titles(lane),
                vec!["c @{2024-01-01}", "b @{2024-02-01}", "a"]
            );
            assert!(matches!(lane.children.last(), Some(LaneChild::Lane(_))));
        }

        #[test]
        fn validate_rejects_broken_hierarchy() {
            let mut board = board("## A\n\n### B\n");
            board.validate().unwrap();
            if let Some(LaneChild::Lane(nested)) = board.lanes[0].children.first_mut() {
                nested.level = 1;
            }
            assert!(matches!(board.validate(), Err(BoardError::Hierarchy(_))));
        }

        #[test]
        fn reparse_keeps_failed_items_and_ids() {
            let mut board = board("## Todo\n\n- [ ] fine #t\n- [ ] broken\n");
            let ids: Vec<ItemId> = board.lanes[0].items().map(|i| i.id).collect();
            let deep: Vec<String> = (0..40).map(|d| format!("{}- x", "  ".repeat(d))).collect();
            if let Some(LaneChild::Item(item)) = board.lanes[0].children.get_mut(1) {
                item.data.title_raw = format!("broken\n{}", deep.join("\n"));
            }
            board.settings.move_tags = Some(true);

            let report = reparse_all_items(&board, &ParseOptions::default());
            assert_eq!(report.failures.len(), 1);
            assert_eq!(report.failures[0].item_id, ids[1]);
            let after: Vec<ItemId> = report.board.lanes[0].items().map(|i| i.id).collect();
            assert_eq!(after, ids);
            let fine = report.board.find_item(ids[0]).unwrap();
            assert_eq!(fine.data.title, "fine");
            let broken = report.board.find_item(ids[1]).unwrap();
            assert!(broken.data.title_raw.starts_with("broken\n"));
        }
    }
}

pub use crate::core::{
    Board, BoardError, FieldKind, FileAccessor, InlineField, Item, ItemData, ItemId,
    ItemMetadata, Lane, LaneChild, LaneId, LaneSort, SourceRange,
};
pub use format::format_board;
pub use item::{
    FileMetadataSource, ItemContext, NoFileMetadata, TitlePreprocessor, VerbatimTitle,
    compose_item, decompose_item, parse_item_text,
};
pub use ops::{ItemFailure, ReparseReport, item_from_title, reparse_all_items};
pub use parser::{ParseOptions, parse_board_from_str};
pub use settings::{BoardSettings, InlineMetadataPosition, InsertionMethod, Locale, SettingsLookup};
