//! 文档存储接口定义
//!
//! 作业框架只依赖通用文档存储的少量操作：
//! - `save` 按 (类型, 键, 站点) 写入或覆盖文档
//! - `get` 按键读取
//! - `purge` 按键删除
//! - `find` 按类型扫描（进程注册表和轮询传输使用）
//!
//! 每次调用各自提交，框架不使用跨调用事务。

use async_trait::async_trait;

use crate::{
    models::{Document, DocumentKey, DocumentQuery},
    CoordinatorResult,
};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 保存文档；同键文档已存在时保留其 id 与创建时间
    async fn save(&self, document: Document) -> CoordinatorResult<Document>;

    async fn get(&self, key: &DocumentKey) -> CoordinatorResult<Option<Document>>;

    /// 删除文档，返回删除的数量
    async fn purge(&self, key: &DocumentKey) -> CoordinatorResult<u64>;

    async fn find(&self, query: &DocumentQuery) -> CoordinatorResult<Vec<Document>>;
}
