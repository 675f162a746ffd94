use crate::time_entry::{AvailableTask, TaskId};

/// 入力欄の状態。表示テキストと、候補から選んだタスクのIDを持つ。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskInput {
    pub text: String,
    pub task_id: Option<TaskId>,
}

impl TaskInput {
    /// 自由入力でテキストを書き換える。
    ///
    /// 選択済みのタスクとの関連付けは解除する。
    pub fn type_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.task_id = None;
    }

    /// 候補を選択する。
    pub fn select(&mut self, task: &AvailableTask) {
        self.text = task.title.clone();
        self.task_id = Some(task.task_id);
    }
}

/// 起動時に取得した、time entryを持たないタスクの一覧。
#[derive(Clone, Debug, Default)]
pub struct TaskCatalog {
    tasks: Vec<AvailableTask>,
}

impl TaskCatalog {
    pub fn new(tasks: Vec<AvailableTask>) -> Self {
        Self { tasks }
    }

    /// 入力に部分一致するタスクを返す。大文字・小文字は区別しない。
    ///
    /// 前後の空白を除いた入力が空の場合は候補を返さない。
    pub fn suggest(&self, query: &str) -> Vec<&AvailableTask> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return vec![];
        }

        self.tasks
            .iter()
            .filter(|task| task.title.to_lowercase().contains(&query))
            .collect()
    }

    pub fn find(&self, task_id: TaskId) -> Option<&AvailableTask> {
        self.tasks.iter().find(|task| task.task_id == task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
