/// Log tags identifying the subsystem that produced a message

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Hub,
    Client,
    Producer,
    Webserver,
    Jobs,
}

impl LogTag {
    /// Key used by --debug-<key> flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Hub => "hub",
            LogTag::Client => "client",
            LogTag::Producer => "producer",
            LogTag::Webserver => "webserver",
            LogTag::Jobs => "jobs",
        }
        .to_string()
    }

    /// Uppercase label used in console and file output
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Hub => "HUB",
            LogTag::Client => "CLIENT",
            LogTag::Producer => "PRODUCER",
            LogTag::Webserver => "WEBSERVER",
            LogTag::Jobs => "JOBS",
        }
    }
}
