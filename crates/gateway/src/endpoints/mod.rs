//! # Gatewayエンドポイント
//!
//! - `POST /api/v0/upload-pic` — 画像をステージングしてIPFSへ中継し、CIDを返す
//! - `POST /api/v0/create-post` — 投稿に作成日時を付与してOrbitDBへ中継する
//!
//! 2つのフローは独立しており、リクエスト間で状態を共有しない。
//! CIDを投稿に含めるのはクライアントの責務。

pub mod create_post;
pub mod upload_pic;


pub use create_post::handle_create_post;
pub use upload_pic::handle_upload_pic;
