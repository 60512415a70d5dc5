//! docdesk_core: the session, query and cache coordinator behind the
//! document-management UI.

pub mod cache;
pub mod desk;
pub mod domain;
pub mod highlight;
pub mod ports;
pub mod query;
pub mod session;
pub mod view;
mod workflow;

pub use cache::{OcrCache, OcrTicket};
pub use desk::{DeskError, DocumentDesk};
pub use domain::{
    AuthGrant, Credentials, Document, DocumentFields, DocumentId, FileUpload, OcrText,
    Registration, SearchMode, SearchQuery, User,
};
pub use highlight::{highlight, Fragment};
pub use ports::{DocumentRepository, DownloadSink, PortError, PortResult, TokenStore};
pub use query::{QueryCoordinator, QueryTicket, SearchState};
pub use session::{AuthMode, SessionManager, SessionStatus};
pub use view::{Confirmation, DeskView, EditForm, Notice, NoticeKind, OcrView};
