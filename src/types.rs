//! Core identifier types shared across the folder, peer and reader layers.

/// FolderID: Identifier of a shared folder, unique within a registry
pub type FolderID = String;

/// PeerID: Opaque identifier of a cluster participant
pub type PeerID = String;
