//! Command composition.
//!
//! Turns a validated module and its key material into the final command
//! line. Ordering is part of the contract with the shell that runs it:
//!
//! ```text
//! prep     mkdir /FsGuard, chmod +x genfilelist.py   (fetch stage)
//!          minisign -WG                              (generated keys only)
//! main     python3 genfilelist.py <target> ...       (one per target)
//!          minisign -Sm, signature assembly
//! cleanup  mv /sources/FsGuard <location>
//!          rm minisign.key minisign.pub              (generated keys only)
//! ```

use crate::command::CommandSequence;
use crate::module::FsGuardModule;
use crate::policy::KeyMaterial;

/// Working directory created inside the build container.
pub const WORK_DIR: &str = "/FsGuard";
/// Mount point of the recipe's sources directory inside the container.
pub const CONTAINER_SOURCES: &str = "/sources";

const FILELIST: &str = "/FsGuard/filelist";
const FILELIST_SIG: &str = "/FsGuard/filelist.minisig";
const SIGNATURE: &str = "/FsGuard/signature";
const STAGED_TOOL: &str = "/sources/FsGuard";

const FIRST_DELIMITER: &str = "----begin attach----";
const SECOND_DELIMITER: &str = "----begin second attach----";

/// Container path of the staged filelist generator for a module.
pub fn script_path(module_name: &str) -> String {
    format!("{}/{}/genfilelist.py", CONTAINER_SOURCES, module_name)
}

/// One filelist generation command per target, in input order.
pub fn filelist_commands(module: &FsGuardModule) -> Vec<String> {
    let script = script_path(&module.name);
    module
        .filelist_paths
        .iter()
        .map(|target| {
            format!(
                "python3 {} {} {} {}",
                script, target, FILELIST, module.fsguard_location
            )
        })
        .collect()
}

/// Sign the filelist and append signature plus public key to the tool.
///
/// The key directory is interpolated as given, so a generated key yields
/// `.//minisign.pub`.
pub fn signing_commands(key: &KeyMaterial) -> Vec<String> {
    let dir = key.key_dir();
    vec![
        format!(
            "minisign -Sm {} -p {}/minisign.pub -s {}/minisign.key",
            FILELIST, dir, dir
        ),
        format!("touch {}", SIGNATURE),
        format!("echo -n \"{}\" >> {}", FIRST_DELIMITER, SIGNATURE),
        format!("cat {} >> {}", FILELIST_SIG, SIGNATURE),
        format!("echo -n \"{}\" >> {}", SECOND_DELIMITER, SIGNATURE),
        format!("tail -n1 {}/minisign.pub >> {}", dir, SIGNATURE),
        format!("cat {} >> {}", SIGNATURE, STAGED_TOOL),
    ]
}

/// Move the signed tool to its final location.
pub fn install_command(module: &FsGuardModule) -> String {
    format!("mv {} {}", STAGED_TOOL, module.fsguard_location)
}

/// Append the key, filelist, signing and install commands to `seq` and
/// render the full command line.
///
/// `seq` is expected to already hold the fetch stage's prep commands.
pub fn compose(module: &FsGuardModule, key: &KeyMaterial, seq: &mut CommandSequence) -> String {
    key.register_generation(seq);

    seq.main.extend(filelist_commands(module));
    seq.main.extend(signing_commands(key));

    seq.cleanup.push(install_command(module));
    key.register_removal(seq);

    tracing::debug!(
        module = %module.name,
        prep = seq.prep.len(),
        main = seq.main.len(),
        cleanup = seq.cleanup.len(),
        "composed command line"
    );

    seq.join()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CONJUNCTION;

    fn module(targets: &[&str]) -> FsGuardModule {
        FsGuardModule {
            name: "m1".into(),
            module_type: "fsguard".into(),
            custom_fsguard: false,
            fsguard_location: "/out".into(),
            generate_key: true,
            key_path: String::new(),
            filelist_paths: targets.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn position(tokens: &[&str], prefix: &str) -> usize {
        tokens
            .iter()
            .position(|t| t.starts_with(prefix))
            .unwrap_or_else(|| panic!("no command starting with {prefix}"))
    }

    #[test]
    fn test_filelist_commands_keep_order() {
        let cmds = filelist_commands(&module(&["/usr/bin", "/bin", "/usr/sbin"]));
        assert_eq!(
            cmds,
            vec![
                "python3 /sources/m1/genfilelist.py /usr/bin /FsGuard/filelist /out",
                "python3 /sources/m1/genfilelist.py /bin /FsGuard/filelist /out",
                "python3 /sources/m1/genfilelist.py /usr/sbin /FsGuard/filelist /out",
            ]
        );
    }

    #[test]
    fn test_signing_with_supplied_key() {
        let cmds = signing_commands(&KeyMaterial::Supplied("/etc/keys".into()));
        assert_eq!(
            cmds[0],
            "minisign -Sm /FsGuard/filelist -p /etc/keys/minisign.pub -s /etc/keys/minisign.key"
        );
        assert_eq!(cmds[5], "tail -n1 /etc/keys/minisign.pub >> /FsGuard/signature");
        assert_eq!(cmds.last().unwrap(), "cat /FsGuard/signature >> /sources/FsGuard");
    }

    #[test]
    fn test_signing_delimiters() {
        let cmds = signing_commands(&KeyMaterial::Generated);
        assert_eq!(cmds[2], "echo -n \"----begin attach----\" >> /FsGuard/signature");
        assert_eq!(cmds[3], "cat /FsGuard/filelist.minisig >> /FsGuard/signature");
        assert_eq!(
            cmds[4],
            "echo -n \"----begin second attach----\" >> /FsGuard/signature"
        );
    }

    #[test]
    fn test_compose_generated_key_ordering() {
        let mut seq = CommandSequence::new();
        seq.prep.push("mkdir /FsGuard".into());
        seq.prep.push(format!("chmod +x {}", script_path("m1")));

        let line = compose(&module(&["/bin"]), &KeyMaterial::Generated, &mut seq);
        let tokens: Vec<&str> = line.split(CONJUNCTION).collect();

        assert_eq!(tokens[0], "mkdir /FsGuard");
        let keygen = position(&tokens, "minisign -WG");
        let sign = position(&tokens, "minisign -Sm");
        let mv = position(&tokens, "mv /sources/FsGuard");
        let rm = position(&tokens, "rm ./minisign.key");
        assert!(keygen < sign);
        assert!(mv < rm);
        assert_eq!(tokens[mv], "mv /sources/FsGuard /out");
        assert_eq!(rm, tokens.len() - 1);

        let manifests: Vec<_> = tokens.iter().filter(|t| t.starts_with("python3 ")).collect();
        assert_eq!(manifests.len(), 1);
        assert!(manifests[0].contains(" /bin "));
    }

    #[test]
    fn test_compose_supplied_key_has_no_key_lifecycle() {
        let mut seq = CommandSequence::new();
        let line = compose(
            &module(&["/bin", "/usr"]),
            &KeyMaterial::Supplied("/keys".into()),
            &mut seq,
        );
        assert!(!line.contains("minisign -WG"));
        assert!(!line.contains("rm "));
        assert!(line.ends_with("mv /sources/FsGuard /out"));
        assert_eq!(line.matches("/keys/minisign.pub").count(), 2);
    }

    #[test]
    fn test_compose_without_targets_still_signs() {
        let mut seq = CommandSequence::new();
        let line = compose(&module(&[]), &KeyMaterial::Generated, &mut seq);
        assert!(!line.contains("python3"));
        assert!(line.contains("minisign -Sm"));
    }
}
