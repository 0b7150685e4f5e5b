//! Fixtures shared by the integration tests in `tests/`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Stand-in for the OpenMP sample: a shell script that prints one line per
/// thread in reverse order and exits 2 when only one thread is allowed.
pub const THREADS_SCRIPT: &str = r#"#!/bin/sh
n=${OMP_NUM_THREADS:-1}
if [ "$n" -lt 2 ]; then
  echo "expected more than one thread" >&2
  exit 2
fi
i=$n
while [ "$i" -gt 0 ]; do
  echo "$i of $n"
  i=$((i - 1))
done
exit 0

/* CMake-easytest configuration.
 *
 * CONFIGS: sort env
 *
 * COMPILE_FLAGS: @OpenMP_C_FLAGS@
 * LINK: @OpenMP_C_FLAGS@
 *
 *
 * ENVIRONMENT-sort: OMP_NUM_THREADS=4
 * RUN-sort: @BINARY@ | @sort@
 * PASS-sort: 1.*2.*3.*4
 *
 * ENVIRONMENT-env: OMP_NUM_THREADS=1
 * FAIL-env: 2
 */
"#;

/// The OpenMP sample as it appears in the test suite it came from
pub const OPENMP_SOURCE: &str = r#"#include <omp.h>
#include <stdio.h>

int main(void)
{
#pragma omp parallel
  printf("%d of %d\n", omp_get_thread_num() + 1, omp_get_num_threads());
  return 0;
}

/* CMake-easytest configuration.
 *
 * CONFIGS: sort env
 *
 * COMPILE_FLAGS: @OpenMP_C_FLAGS@
 * LINK: @OpenMP_C_FLAGS@
 *
 *
 * ENVIRONMENT-sort: OMP_NUM_THREADS=4
 * RUN-sort: @BINARY@ | @sort@
 * PASS-sort: 1.*2.*3.*4
 *
 * ENVIRONMENT-env: OMP_NUM_THREADS=1
 * FAIL-env: 2
 */
"#;

pub fn write_fixture(dir: &Path, name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

/// Write a fixture with the executable bit set, so copying it yields a runnable binary
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, contents: &str) -> io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = write_fixture(dir, name, contents)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}
