//! Embeds shown to users

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::domain::entities::user::mention;
use crate::domain::entities::{Button, Color, DrawId, DrawOutcome, Embed, LuckyDraw};
use crate::domain::traits::{FileStatus, StoreStatus};

/// Custom id prefix of the join button
pub const JOIN_PREFIX: &str = "lucky_draw:join:";

pub fn join_custom_id(id: DrawId) -> String {
    format!("{}{}", JOIN_PREFIX, id)
}

pub fn parse_join_custom_id(custom_id: &str) -> Option<DrawId> {
    custom_id.strip_prefix(JOIN_PREFIX)?.parse().ok()
}

/// "H小時M分鐘" from one hour up, otherwise "M分鐘"
pub fn format_remaining(minutes_left: i64) -> String {
    let hours = minutes_left / 60;
    let minutes = minutes_left % 60;
    if hours > 0 {
        format!("{}小時{}分鐘", hours, minutes)
    } else {
        format!("{}分鐘", minutes)
    }
}

/// Builds embeds with times shown in the configured zone
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    tz: Tz,
}

impl Renderer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    fn local(&self, t: DateTime<Utc>, format: &str) -> String {
        t.with_timezone(&self.tz).format(format).to_string()
    }

    pub fn join_button(&self, id: DrawId) -> Button {
        Button::new("參加", join_custom_id(id)).with_emoji("🎉")
    }

    pub fn draw_embed(&self, draw: &LuckyDraw, now: DateTime<Utc>) -> Embed {
        Embed::new("🎉 抽獎活動 🎉", Color::Gold)
            .with_description(format!("獎品：**{}**", draw.prize))
            .field("⏰ 結束時間", self.local(draw.end_time, "%Y-%m-%d %H:%M:%S"), true)
            .field("⏱️ 剩餘時間", format!("{} 分鐘", draw.minutes_left(now)), true)
            .field("👥 參加人數", format!("{} 人", draw.participants.len()), true)
            .field("🏆 得獎名額", format!("{} 人", draw.winners_count), true)
            .with_footer(format!("抽獎ID: {} | 創建者: {}", draw.id, draw.creator_name))
    }

    pub fn active_list_embed(&self, draws: &[LuckyDraw], now: DateTime<Utc>) -> Embed {
        if draws.is_empty() {
            return Embed::new("📋 進行中的抽獎活動", Color::Blue)
                .with_description("目前沒有進行中的抽獎活動。")
                .field("💡 提示", "使用 `/抽獎` 指令來創建新的抽獎活動！", false);
        }

        draws.iter().fold(
            Embed::new("📋 進行中的抽獎活動", Color::Blue)
                .with_description(format!("共有 {} 個進行中的抽獎", draws.len())),
            |embed, draw| {
                embed.field(
                    format!("🎁 ID: {} - {}", draw.id, draw.prize),
                    format!(
                        "👥 參加人數：{}\n🏆 得獎名額：{}\n⏰ 剩餘時間：{}\n👤 創建者：{}",
                        draw.participants.len(),
                        draw.winners_count,
                        format_remaining(draw.minutes_left(now)),
                        draw.creator_name
                    ),
                    false,
                )
            },
        )
    }

    pub fn history_embed(&self, draws: &[LuckyDraw]) -> Embed {
        draws.iter().fold(
            Embed::new("📜 抽獎紀錄", Color::Purple)
                .with_description(format!("最近 {} 筆抽獎結果", draws.len())),
            |embed, draw| {
                let winners = match draw.winner_ids.as_slice() {
                    [] => "無人參加".to_string(),
                    [only] => mention(*only),
                    many => format!("{} 位得獎者", many.len()),
                };
                embed.field(
                    format!("ID: {} - {}", draw.id, draw.prize),
                    format!(
                        "🏆 得獎者：{}\n👥 參加人數：{} / 名額：{}\n📅 結束時間：{}",
                        winners,
                        draw.participants.len(),
                        draw.winners_count,
                        self.local(draw.end_time, "%m/%d %H:%M")
                    ),
                    false,
                )
            },
        )
    }

    /// Content line posted above the result embed
    pub fn result_content(&self, outcome: &DrawOutcome) -> &'static str {
        if outcome.winners.is_empty() {
            "抽獎已結束"
        } else {
            "@everyone 抽獎結果出爐！"
        }
    }

    pub fn result_embed(&self, draw: &LuckyDraw, outcome: &DrawOutcome, now: DateTime<Utc>) -> Embed {
        let mut embed = Embed::new("🎊 抽獎結果公布 🎊", Color::Green)
            .with_description(format!("獎品：**{}**", draw.prize));

        if outcome.participants == 0 {
            embed = embed.field("😢 結果", "沒有人參加這次抽獎", false);
        } else {
            let list = outcome
                .winners
                .iter()
                .enumerate()
                .map(|(i, id)| format!("{}. {}", i + 1, mention(*id)))
                .collect::<Vec<_>>()
                .join("\n");
            embed = embed
                .field(format!("🏆 恭喜得獎者（共 {} 位）", outcome.winners.len()), list, false)
                .field("🎉 獲得獎品", format!("**{}**", draw.prize), false);

            if outcome.is_short() {
                embed = embed.field(
                    "⚠️ 注意",
                    format!(
                        "原定抽 {} 位得獎者，但只有 {} 人參加",
                        outcome.requested, outcome.participants
                    ),
                    false,
                );
            }
        }

        embed
            .field(
                "📊 統計資訊",
                format!(
                    "• 參加人數：{} 人\n• 得獎名額：{} 人\n• 抽獎ID：{}\n• 創建者：{}",
                    outcome.participants, outcome.requested, draw.id, draw.creator_name
                ),
                false,
            )
            .with_footer(format!("結束時間：{}", self.local(now, "%Y-%m-%d %H:%M:%S")))
    }

    fn file_line(&self, file: Option<&FileStatus>) -> String {
        match file {
            Some(f) => format!(
                "大小：{:.2} KB\n最後修改：{}",
                f.size_bytes as f64 / 1024.0,
                self.local(f.modified, "%Y-%m-%d %H:%M:%S")
            ),
            None => "❌ 不存在".to_string(),
        }
    }

    pub fn backup_embed(&self, status: &StoreStatus, total: usize, active: usize) -> Embed {
        Embed::new("💾 資料備份狀態", Color::Blue)
            .field("主要資料檔", self.file_line(status.primary.as_ref()), false)
            .field("備份檔案", self.file_line(status.backup.as_ref()), false)
            .field(
                "📊 資料統計",
                format!(
                    "總抽獎數：{}\n進行中：{}\n已結束：{}",
                    total,
                    active,
                    total - active
                ),
                false,
            )
            .with_footer(format!("資料目錄：{}", status.location))
    }

    pub fn help_embed(&self) -> Embed {
        Embed::new("🎰 抽獎機器人使用指南", Color::Green)
            .with_description("歡迎使用抽獎機器人！以下是所有可用的斜線指令：")
            .field(
                "🎉 `/抽獎`",
                "創建新的抽獎活動\n• **prize**: 獎品名稱\n• **minutes**: 持續時間（分鐘）\n• **winners**: 得獎者數量（選填，預設1人）",
                false,
            )
            .field("📋 `/抽獎列表`", "查看所有進行中的抽獎活動", false)
            .field("📜 `/抽獎紀錄`", "查看最近的抽獎結果\n• **limit**: 顯示數量（選填）", false)
            .field("🛑 `/強制結束`", "強制結束抽獎（管理員專用）\n• **draw_id**: 抽獎ID", false)
            .field("💾 `/備份狀態`", "查看資料備份狀態（管理員專用）", false)
            .field(
                "💡 使用提示",
                "• 輸入 `/` 即可看到所有可用指令\n• 點擊「參加」按鈕參與抽獎\n• 每人每個抽獎只能參加一次\n• 可設定多位得獎者（預設1位）\n• 時間到達後會自動開獎\n• 資料會定期自動儲存",
                false,
            )
            .with_footer("祝你好運！🍀")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeSet;

    fn draw() -> LuckyDraw {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap();
        LuckyDraw {
            id: 7,
            prize: "Switch".to_string(),
            end_time: created + Duration::minutes(90),
            participants: BTreeSet::from([1, 2, 3]),
            channel_id: 1,
            creator_id: 9,
            creator_name: "host".to_string(),
            active: true,
            created_at: created,
            ended_at: None,
            winners_count: 2,
            winner_ids: Vec::new(),
            message_id: None,
        }
    }

    #[test]
    fn remaining_time_format() {
        assert_eq!(format_remaining(0), "0分鐘");
        assert_eq!(format_remaining(59), "59分鐘");
        assert_eq!(format_remaining(60), "1小時0分鐘");
        assert_eq!(format_remaining(125), "2小時5分鐘");
    }

    #[test]
    fn join_custom_id_round_trip() {
        assert_eq!(join_custom_id(12), "lucky_draw:join:12");
        assert_eq!(parse_join_custom_id("lucky_draw:join:12"), Some(12));
        assert_eq!(parse_join_custom_id("lucky_draw:join:x"), None);
        assert_eq!(parse_join_custom_id("other:12"), None);
    }

    #[test]
    fn draw_embed_uses_local_time() {
        let r = Renderer::new(chrono_tz::Asia::Taipei);
        let d = draw();
        let embed = r.draw_embed(&d, d.created_at);
        assert_eq!(embed.field_value("⏰ 結束時間"), Some("2024-05-01 13:30:00"));
        assert_eq!(embed.field_value("⏱️ 剩餘時間"), Some("90 分鐘"));
        assert_eq!(embed.field_value("👥 參加人數"), Some("3 人"));
        assert_eq!(embed.field_value("🏆 得獎名額"), Some("2 人"));
        assert_eq!(embed.footer.as_deref(), Some("抽獎ID: 7 | 創建者: host"));
    }

    #[test]
    fn history_winner_text() {
        let r = Renderer::new(chrono_tz::UTC);
        let mut none = draw();
        none.id = 1;
        let mut one = draw();
        one.id = 2;
        one.winner_ids = vec![3];
        let mut many = draw();
        many.id = 3;
        many.winner_ids = vec![1, 2];

        let embed = r.history_embed(&[none, one, many]);
        assert!(embed.fields[0].value.contains("無人參加"));
        assert!(embed.fields[1].value.contains("<@3>"));
        assert!(embed.fields[2].value.contains("2 位得獎者"));
    }

    #[test]
    fn result_embed_notes_shortfall() {
        let r = Renderer::new(chrono_tz::UTC);
        let d = draw();
        let outcome = DrawOutcome {
            draw_id: 7,
            winners: vec![2],
            requested: 3,
            participants: 1,
        };
        let embed = r.result_embed(&d, &outcome, d.end_time);
        assert_eq!(r.result_content(&outcome), "@everyone 抽獎結果出爐！");
        assert_eq!(embed.field_value("🏆 恭喜得獎者（共 1 位）"), Some("1. <@2>"));
        assert_eq!(embed.field_value("⚠️ 注意"), Some("原定抽 3 位得獎者，但只有 1 人參加"));

        let empty = DrawOutcome {
            draw_id: 7,
            winners: vec![],
            requested: 3,
            participants: 0,
        };
        let embed = r.result_embed(&d, &empty, d.end_time);
        assert_eq!(r.result_content(&empty), "抽獎已結束");
        assert_eq!(embed.field_value("😢 結果"), Some("沒有人參加這次抽獎"));
    }

    #[test]
    fn backup_embed_reports_missing_files() {
        let r = Renderer::new(chrono_tz::UTC);
        let status = StoreStatus {
            location: "/app/data".to_string(),
            primary: Some(FileStatus {
                size_bytes: 2048,
                modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            }),
            backup: None,
        };
        let embed = r.backup_embed(&status, 5, 2);
        assert_eq!(
            embed.field_value("主要資料檔"),
            Some("大小：2.00 KB\n最後修改：2024-01-01 00:00:00")
        );
        assert_eq!(embed.field_value("備份檔案"), Some("❌ 不存在"));
        assert_eq!(embed.field_value("📊 資料統計"), Some("總抽獎數：5\n進行中：2\n已結束：3"));
        assert_eq!(embed.footer.as_deref(), Some("資料目錄：/app/data"));
    }
}
