pub mod classifier;
pub mod config;
pub mod negotiation;
pub mod session;
pub mod testing;
pub mod transport;

pub use classifier::{Classification, LineClassifier, Screening, ScreeningRules};
pub use config::{
    load_config, load_config_from_str, validate_config, BotsConfig, Config, ConfigError,
    IrcConfig, NegotiationConfig,
};
pub use negotiation::{
    DownloadRequest, DownloadRequestError, InvalidTransition, Negotiation, NegotiationError,
    NegotiationEvent, NegotiationOutcome, Outcome, Stage,
};
pub use session::{PendingRequest, Session, SessionError, SessionEvent};
pub use transport::{
    ChatSender, ChatTransport, Identity, InboundMessage, IrcTransport, TransportError,
    TransportEvent, TransportLink,
};
