mod replay;

pub use replay::ReqwestReplay;
