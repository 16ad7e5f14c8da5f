// 支出カテゴリ
//
// 抽出サービスが返すカテゴリ名を閉じた列挙型に正規化する。
// 英語名と、抽出プロンプトで指示するスペイン語ラベルの両方を受け付ける。

use std::fmt;

/// 支出カテゴリ（閉じた集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    Food,
    Transport,
    Entertainment,
    Utilities,
    Shopping,
    Health,
    /// コマンドパス（抽出なし）や未知のラベルのデフォルト
    #[default]
    Other,
}

impl Category {
    /// 全カテゴリ（プロンプト生成・テスト用）
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Transport,
        Category::Entertainment,
        Category::Utilities,
        Category::Shopping,
        Category::Health,
        Category::Other,
    ];

    /// 英語名
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Entertainment => "Entertainment",
            Category::Utilities => "Utilities",
            Category::Shopping => "Shopping",
            Category::Health => "Health",
            Category::Other => "Other",
        }
    }

    /// 抽出プロンプトで使うスペイン語ラベル
    pub fn spanish_label(&self) -> &'static str {
        match self {
            Category::Food => "Comida",
            Category::Transport => "Transporte",
            Category::Entertainment => "Entretenimiento",
            Category::Utilities => "Servicios",
            Category::Shopping => "Compras",
            Category::Health => "Salud",
            Category::Other => "Otros",
        }
    }

    /// ラベルからカテゴリを解決する
    ///
    /// 大文字小文字とアクセント記号を無視して英語名・スペイン語ラベルを照合する。
    /// どれにも一致しない場合は`None`を返す（呼び出し側で`Other`に寄せる）。
    pub fn from_label(label: &str) -> Option<Self> {
        let key = fold_label(label);
        if key.is_empty() {
            return None;
        }

        Self::ALL.into_iter().find(|category| {
            fold_label(category.as_str()) == key || fold_label(category.spanish_label()) == key
        })
    }

    /// ラベルを解決し、未知のラベルは`Other`にする
    pub fn from_label_or_other(label: &str) -> Self {
        Self::from_label(label).unwrap_or_default()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 照合用にラベルを小文字化し、アクセント記号を落とす
fn fold_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
