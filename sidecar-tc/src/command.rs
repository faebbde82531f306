//! Pure generation of the `tc` command sequences that realize a partition
//! topology on the staging side of the qdisc tree.
//!
//! Every update tears the staging qdisc down and rebuilds it from scratch
//! rather than diffing it against the previous configuration. That is O(peers)
//! work per call even for a one-IP change, but it guarantees no stale rule
//! ever lingers, and it makes a half-applied previous failure harmless: the
//! next call starts from a clean slate. The only command that ever touches
//! live traffic is the final root-filter replace.

use std::{collections::HashMap, fmt, net::IpAddr};

use crate::{
    connection::PartitionConnection,
    qdisc::{
        next_unused_qdisc_id, ClassId, IdError, QdiscId, WorkingQdisc, LAST_INIT_QDISC_MAJOR,
        ROOT_CLASS_A_ID, ROOT_CLASS_B_ID, ROOT_FILTER_ID, ROOT_QDISC_ID,
    },
};

/// First class minor number handed out under a working qdisc.
const FIRST_CLASS_MINOR: u32 = 1;

/// htb rate used on every class. The htb tree is used purely for its
/// classification structure, never for rate limiting.
const FULL_RATE: &str = "100%";

/// Priority of the per-peer u32 filters.
const FILTER_PRIORITY: &str = "1";

/// Token joining the sub-commands of one shell invocation.
const COMMAND_SEPARATOR: &str = "&&";

/// An ordered token list making up one shell invocation inside the sidecar
/// container. Sub-commands are joined by `&&` tokens, so the exec layer
/// treats the whole sequence as a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarCommand(Vec<String>);

impl SidecarCommand {
    fn merge(commands: Vec<Vec<String>>) -> Self {
        let mut tokens = Vec::new();
        for (index, command) in commands.into_iter().enumerate() {
            if index > 0 {
                tokens.push(COMMAND_SEPARATOR.to_string());
            }
            tokens.extend(command);
        }
        Self(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for SidecarCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// The one-time root setup: htb root qdisc `1:`, root classes `1:1`/`1:2`,
/// the root `basic` filter pointed at class `1:1` (qdisc A live), and empty
/// working qdiscs `2:`/`3:`.
pub fn generate_init_command(interface: &str) -> SidecarCommand {
    SidecarCommand::merge(vec![
        add_root_qdisc(interface),
        add_class(interface, ROOT_QDISC_ID, ROOT_CLASS_A_ID),
        add_class(interface, ROOT_QDISC_ID, ROOT_CLASS_B_ID),
        add_root_filter(interface),
        add_qdisc(interface, ROOT_CLASS_A_ID, WorkingQdisc::A.qdisc_id(), "htb"),
        add_qdisc(interface, ROOT_CLASS_B_ID, WorkingQdisc::B.qdisc_id(), "htb"),
    ])
}

/// Builds the full command sequence realizing `connections` on the `staging`
/// working qdisc, ending with the atomic root-filter cutover to it.
///
/// Peers are emitted in sorted IP-string order, so the same map always
/// yields the same byte-for-byte command line. An empty map is valid: it
/// produces a bare staging qdisc through which traffic falls to default,
/// i.e. "unblock everything".
pub fn generate_update_command(
    interface: &str,
    staging: WorkingQdisc,
    connections: &HashMap<IpAddr, PartitionConnection>,
) -> Result<SidecarCommand, IdError> {
    let staging_qdisc = staging.qdisc_id();
    let staging_class = staging.root_class_id();

    let mut commands = vec![
        remove_qdisc(interface, staging_class, staging_qdisc),
        add_qdisc(interface, staging_class, staging_qdisc, "htb"),
    ];

    let mut peers: Vec<(String, PartitionConnection)> =
        connections.iter().map(|(ip, conn)| (ip.to_string(), *conn)).collect();
    peers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut class_minor = FIRST_CLASS_MINOR;
    let mut previous_major = LAST_INIT_QDISC_MAJOR;
    for (ip, connection) in peers {
        let class_id = ClassId::new(staging_qdisc, class_minor);
        class_minor += 1;
        let (netem_qdisc, major) = next_unused_qdisc_id(staging_qdisc, previous_major)?;
        previous_major = major;

        commands.push(add_class(interface, staging_qdisc, class_id));
        commands.push(add_filter_by_ip(interface, staging_qdisc, class_id, &ip));
        commands.push(add_netem_qdisc(interface, class_id, netem_qdisc, connection));
    }

    commands.push(replace_root_filter(interface, staging_class));

    Ok(SidecarCommand::merge(commands))
}

fn add_root_qdisc(interface: &str) -> Vec<String> {
    vec![
        "tc".into(),
        "qdisc".into(),
        "add".into(),
        "dev".into(),
        interface.into(),
        "root".into(),
        "handle".into(),
        ROOT_QDISC_ID.to_string(),
        "htb".into(),
    ]
}

fn add_qdisc(interface: &str, parent: ClassId, qdisc: QdiscId, kind: &str) -> Vec<String> {
    vec![
        "tc".into(),
        "qdisc".into(),
        "add".into(),
        "dev".into(),
        interface.into(),
        "parent".into(),
        parent.to_string(),
        "handle".into(),
        qdisc.to_string(),
        kind.into(),
    ]
}

fn remove_qdisc(interface: &str, parent: ClassId, qdisc: QdiscId) -> Vec<String> {
    vec![
        "tc".into(),
        "qdisc".into(),
        "del".into(),
        "dev".into(),
        interface.into(),
        "parent".into(),
        parent.to_string(),
        "handle".into(),
        qdisc.to_string(),
        "htb".into(),
    ]
}

fn add_class(interface: &str, parent: QdiscId, class: ClassId) -> Vec<String> {
    vec![
        "tc".into(),
        "class".into(),
        "add".into(),
        "dev".into(),
        interface.into(),
        "parent".into(),
        parent.to_string(),
        "classid".into(),
        class.to_string(),
        "htb".into(),
        "rate".into(),
        FULL_RATE.into(),
    ]
}

fn add_root_filter(interface: &str) -> Vec<String> {
    vec![
        "tc".into(),
        "filter".into(),
        "add".into(),
        "dev".into(),
        interface.into(),
        "parent".into(),
        ROOT_QDISC_ID.to_string(),
        "handle".into(),
        ROOT_FILTER_ID.to_string(),
        "basic".into(),
        "flowid".into(),
        ROOT_CLASS_A_ID.to_string(),
    ]
}

fn add_filter_by_ip(interface: &str, parent: QdiscId, class: ClassId, ip: &str) -> Vec<String> {
    vec![
        "tc".into(),
        "filter".into(),
        "add".into(),
        "dev".into(),
        interface.into(),
        "parent".into(),
        parent.to_string(),
        "protocol".into(),
        "ip".into(),
        "prio".into(),
        FILTER_PRIORITY.into(),
        "u32".into(),
        "flowid".into(),
        class.to_string(),
        "match".into(),
        "ip".into(),
        "dst".into(),
        ip.into(),
    ]
}

fn add_netem_qdisc(
    interface: &str,
    parent: ClassId,
    qdisc: QdiscId,
    connection: PartitionConnection,
) -> Vec<String> {
    let mut command = add_qdisc(interface, parent, qdisc, "netem");
    command.push("loss".into());
    command.push(format!("{}%", connection.packet_loss_percentage()));

    // No delay configured means no `delay` clause at all; a loss-only rule
    // must not carry a trailing empty delay.
    if let Some(delay) = connection.packet_delay() {
        command.push("delay".into());
        command.push(format!("{}ms", delay.base_ms()));
        if delay.jitter_ms() > 0 || delay.correlation() > 0.0 {
            command.push(format!("{}ms", delay.jitter_ms()));
        }
        if delay.correlation() > 0.0 {
            command.push(format!("{}%", delay.correlation()));
        }
    }

    command
}

fn replace_root_filter(interface: &str, class: ClassId) -> Vec<String> {
    vec![
        "tc".into(),
        "filter".into(),
        "replace".into(),
        "dev".into(),
        interface.into(),
        "parent".into(),
        ROOT_QDISC_ID.to_string(),
        "handle".into(),
        ROOT_FILTER_ID.to_string(),
        "basic".into(),
        "flowid".into(),
        class.to_string(),
    ]
}
