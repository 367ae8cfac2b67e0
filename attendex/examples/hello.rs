use anyhow::Result;

use attendex::io::IndexFile;
use attendex::tree::Direction;

#[tokio::main]
async fn main() -> Result<()> {
    let index = IndexFile::new("hello.dat");

    // No file yet, so an update starts from an empty tree
    let mut tree = index.load_or_default().await?;
    assert!(!tree.update_key(101, 75));
    assert!(!tree.update_key(102, 80));
    assert!(!tree.update_key(103, 75));
    index.store(&tree).await?;

    // Load it again, as a later invocation would
    let mut tree = index.load().await?;
    assert_eq!(tree.collect(70, Direction::Above), vec![102, 101, 103]);

    // Move student 102 down to 60
    assert!(tree.update_key(102, 60));
    index.store(&tree).await?;

    let tree = index.load().await?;
    assert_eq!(tree.collect(100, Direction::Below), vec![101, 103, 102]);

    std::fs::remove_file("hello.dat")?;
    Ok(())
}
