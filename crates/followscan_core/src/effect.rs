/// Side effects the coordinator performs after a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Write the new record to the persisted store.
    Persist,
    /// Push a best-effort STATE_UPDATE to the UI.
    NotifyUi,
}
