//! The tarot deck backing the `dailycard.draw` tool

use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Upright,
    Reversed,
}

impl Orientation {
    /// Label shown to the user in the rendered summary.
    pub fn label(self) -> &'static str {
        match self {
            Self::Upright => "正位",
            Self::Reversed => "逆位",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Reading {
    keywords: &'static [&'static str],
    daily: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct Card {
    name: &'static str,
    upright: Reading,
    reversed: Reading,
}

const DECK: &[Card] = &[
    Card {
        name: "The Fool",
        upright: Reading {
            keywords: &["开始", "信任", "自由"],
            daily: "今天是适合尝试新事物的一天，勇敢迈出第一步吧。",
        },
        reversed: Reading {
            keywords: &["冲动", "犹豫", "鲁莽"],
            daily: "行动前请三思，不要因为一时冲动而失去方向。",
        },
    },
    Card {
        name: "The Magician",
        upright: Reading {
            keywords: &["专注", "意志", "创造力"],
            daily: "专注于你的目标，你的能量会被世界回应。",
        },
        reversed: Reading {
            keywords: &["分心", "拖延", "自我怀疑"],
            daily: "重新聚焦，别被琐事牵着走，找回掌控感。",
        },
    },
    Card {
        name: "The High Priestess",
        upright: Reading {
            keywords: &["直觉", "内在智慧", "平静"],
            daily: "你已经知道答案，信任自己的直觉。",
        },
        reversed: Reading {
            keywords: &["压抑", "焦虑", "迷茫"],
            daily: "放松自己，试着聆听内心真实的声音。",
        },
    },
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DrawnCard {
    pub name: String,
    pub orientation: Orientation,
    pub keywords: Vec<String>,
    pub description: String,
}

impl DrawnCard {
    pub fn summary(&self) -> String {
        format!(
            "你抽到了 **{}**（{}）！",
            self.name,
            self.orientation.label()
        )
    }
}

pub fn draw_card() -> DrawnCard {
    draw_card_with(&mut rand::thread_rng())
}

pub fn draw_card_with<R: Rng>(rng: &mut R) -> DrawnCard {
    let card = &DECK[rng.gen_range(0..DECK.len())];
    let orientation = if rng.gen_bool(0.5) {
        Orientation::Upright
    } else {
        Orientation::Reversed
    };
    let reading = match orientation {
        Orientation::Upright => card.upright,
        Orientation::Reversed => card.reversed,
    };

    DrawnCard {
        name: card.name.to_string(),
        orientation,
        keywords: reading.keywords.iter().map(|k| k.to_string()).collect(),
        description: reading.daily.to_string(),
    }
}
